//! Tenant employee roles.

use serde::{Deserialize, Serialize};

/// Role of an employee inside a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeRole {
    Admin,
    Hr,
    Manager,
    #[default]
    Employee,
}

impl EmployeeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeRole::Admin => "admin",
            EmployeeRole::Hr => "hr",
            EmployeeRole::Manager => "manager",
            EmployeeRole::Employee => "employee",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(EmployeeRole::Admin),
            "hr" => Some(EmployeeRole::Hr),
            "manager" => Some(EmployeeRole::Manager),
            "employee" => Some(EmployeeRole::Employee),
            _ => None,
        }
    }

    /// Admin and HR manage leave policy and every employee's requests.
    pub fn can_manage_leave(&self) -> bool {
        matches!(self, EmployeeRole::Admin | EmployeeRole::Hr)
    }
}
