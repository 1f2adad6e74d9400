//! Employee Routes
//!
//! Tenant user management. Employees are the tenant's sign-in principals and
//! live in the tenant database.
//!
//! Routes:
//! - GET /api/employees - List employees
//! - POST /api/employees - Create an employee (admin/hr)

use axum::{extract::State, http::StatusCode, routing::get, Extension, Json, Router};
use serde::Deserialize;
use tracing::info;

use super::extract::ApiJson;
use crate::db::{self, CreateEmployee, Employee};
use crate::middleware::{TenantContext, TenantUser};
use crate::models::{new_id, EmployeeRole};
use crate::{AppState, Error, Result};

/// Build employee routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/employees", get(list_employees).post(create_employee))
}

#[derive(Debug, Deserialize)]
pub struct CreateEmployeeRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
    #[serde(default)]
    pub role: EmployeeRole,
    #[serde(default)]
    pub manager_id: Option<String>,
}

/// GET /api/employees
#[axum::debug_handler]
async fn list_employees(Extension(ctx): Extension<TenantContext>) -> Result<Json<Vec<Employee>>> {
    Ok(Json(db::list_employees(&ctx.pool).await?))
}

/// Create an employee.
///
/// POST /api/employees
///
/// Only admins may create other admins.
#[axum::debug_handler]
async fn create_employee(
    State(state): State<AppState>,
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    ApiJson(req): ApiJson<CreateEmployeeRequest>,
) -> Result<(StatusCode, Json<Employee>)> {
    if !user.can_manage_leave() {
        return Err(Error::Forbidden);
    }
    if req.role == EmployeeRole::Admin && user.role != EmployeeRole::Admin {
        return Err(Error::Forbidden);
    }

    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(Error::Validation("A valid email is required".into()));
    }
    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return Err(Error::Validation("Display name is required".into()));
    }
    if let Some(manager_id) = &req.manager_id {
        match db::get_employee(&ctx.pool, manager_id).await {
            Ok(_) => {}
            Err(Error::NotFound(_)) => {
                return Err(Error::Validation(format!("Unknown manager {}", manager_id)))
            }
            Err(e) => return Err(e),
        }
    }

    let password_hash = state.auth.hash_password(&req.password).await?;
    let employee = db::create_employee(
        &ctx.pool,
        CreateEmployee {
            id: new_id(),
            email,
            display_name: display_name.to_string(),
            password_hash,
            role: req.role,
            manager_id: req.manager_id,
        },
    )
    .await?;

    info!(
        tenant = %ctx.tenant.slug,
        employee_id = %employee.id,
        role = %employee.role,
        created_by = %user.employee_id,
        "Created employee"
    );
    Ok((StatusCode::CREATED, Json(employee)))
}
