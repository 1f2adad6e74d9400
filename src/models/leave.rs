//! Leave domain enums: holiday kinds, half-day markers and request states.

use serde::{Deserialize, Serialize};

/// Kind of a calendar holiday.
///
/// - Public: a day off for everyone
/// - Optional: a day off only for employees who opted in
/// - Restricted: a day off for everyone, listed separately in the calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HolidayType {
    #[default]
    Public,
    Optional,
    Restricted,
}

impl HolidayType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HolidayType::Public => "public",
            HolidayType::Optional => "optional",
            HolidayType::Restricted => "restricted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "public" => Some(HolidayType::Public),
            "optional" => Some(HolidayType::Optional),
            "restricted" => Some(HolidayType::Restricted),
            _ => None,
        }
    }
}

/// Which half of a single day a half-day request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HalfDay {
    #[default]
    None,
    FirstHalf,
    SecondHalf,
}

impl HalfDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            HalfDay::None => "none",
            HalfDay::FirstHalf => "first_half",
            HalfDay::SecondHalf => "second_half",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "" => Some(HalfDay::None),
            "first_half" => Some(HalfDay::FirstHalf),
            "second_half" => Some(HalfDay::SecondHalf),
            _ => None,
        }
    }

    pub fn is_half(&self) -> bool {
        !matches!(self, HalfDay::None)
    }
}

/// Lifecycle state of a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    PartiallyCancelled,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
            LeaveStatus::Cancelled => "cancelled",
            LeaveStatus::PartiallyCancelled => "partially_cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(LeaveStatus::Pending),
            "approved" => Some(LeaveStatus::Approved),
            "rejected" => Some(LeaveStatus::Rejected),
            "cancelled" => Some(LeaveStatus::Cancelled),
            "partially_cancelled" => Some(LeaveStatus::PartiallyCancelled),
            _ => None,
        }
    }

    /// Requests in these states still hold days on the balance.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            LeaveStatus::Pending | LeaveStatus::Approved | LeaveStatus::PartiallyCancelled
        )
    }

    /// Days of an approved request are counted as used, not pending.
    pub fn counts_as_used(&self) -> bool {
        matches!(self, LeaveStatus::Approved | LeaveStatus::PartiallyCancelled)
    }
}

impl std::fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
