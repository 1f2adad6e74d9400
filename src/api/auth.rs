//! Auth Routes
//!
//! Sign-in for both principal kinds. Which kind a login produces depends on
//! the host: the platform host signs in platform administrators, a tenant
//! host signs in that tenant's employees.
//!
//! Routes:
//! - POST /auth/login - Exchange email and password for a bearer token
//! - GET /auth/me - Current principal

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use super::extract::ApiJson;
use crate::middleware::{require_principal, Principal, PlatformAdminUser, TenantUser};
use crate::models::{ResolvedTenant, TenantScope};
use crate::services::IssuedToken;
use crate::{AppState, Result};

/// Build auth routes.
pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(me))
        .layer(axum::middleware::from_fn_with_state(state, require_principal));

    Router::new().route("/login", post(login)).merge(protected)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub principal: PrincipalResponse,
}

/// Public view of a principal.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrincipalResponse {
    PlatformAdmin {
        #[serde(flatten)]
        admin: PlatformAdminUser,
    },
    TenantUser {
        #[serde(flatten)]
        user: TenantUser,
        tenant: ResolvedTenant,
    },
}

// ============================================================================
// Handlers
// ============================================================================

/// Sign in.
///
/// POST /auth/login
#[axum::debug_handler]
async fn login(
    State(state): State<AppState>,
    Extension(scope): Extension<TenantScope>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    match scope {
        TenantScope::Platform => {
            let (admin, token) = state
                .auth
                .login_platform_admin(&state.db, &req.email, &req.password)
                .await?;
            Ok(Json(LoginResponse {
                token,
                principal: PrincipalResponse::PlatformAdmin {
                    admin: PlatformAdminUser {
                        admin_id: admin.id,
                        email: admin.email,
                        display_name: admin.display_name,
                    },
                },
            }))
        }
        TenantScope::Tenant(tenant) => {
            let pool = state.tenant_pools.get(&tenant).await?;
            let (employee, token) = state
                .auth
                .login_tenant_user(&pool, &tenant, &req.email, &req.password)
                .await?;
            Ok(Json(LoginResponse {
                token,
                principal: PrincipalResponse::TenantUser {
                    user: TenantUser {
                        role: employee.role_enum(),
                        employee_id: employee.id,
                        email: employee.email,
                        display_name: employee.display_name,
                        manager_id: employee.manager_id,
                        tenant_id: tenant.id.clone(),
                    },
                    tenant,
                },
            }))
        }
    }
}

/// Current principal.
///
/// GET /auth/me
#[axum::debug_handler]
async fn me(Extension(principal): Extension<Principal>) -> Json<PrincipalResponse> {
    Json(match principal {
        Principal::PlatformAdmin(admin) => PrincipalResponse::PlatformAdmin { admin },
        Principal::TenantUser(user, context) => PrincipalResponse::TenantUser {
            user,
            tenant: context.tenant,
        },
    })
}
