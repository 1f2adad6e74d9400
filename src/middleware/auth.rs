//! Bearer token authentication middleware.
//!
//! Tokens are JWTs issued by [`AuthService`](crate::services::AuthService).
//! Which tokens a request accepts depends on the scope resolved from its host:
//!
//! | Scope    | Platform admin token | Tenant user token                  |
//! |----------|----------------------|------------------------------------|
//! | Platform | accepted             | 403                                |
//! | Tenant   | 403                  | accepted for the issuing tenant only |
//!
//! Principals are re-loaded from the database on every request so that
//! deactivated employees lose access before their token expires.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;

use crate::{
    db::{self, DbPool},
    error::Error,
    models::{EmployeeRole, ResolvedTenant, TenantScope},
    services::{LeaveActor, PrincipalKind},
    AppState,
};

/// Platform administrator injected by [`require_platform_admin`].
#[derive(Clone, Debug, Serialize)]
pub struct PlatformAdminUser {
    pub admin_id: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Tenant user injected by [`require_tenant_user`].
#[derive(Clone, Debug, Serialize)]
pub struct TenantUser {
    pub employee_id: String,
    pub email: String,
    pub display_name: String,
    pub role: EmployeeRole,
    pub manager_id: Option<String>,
    pub tenant_id: String,
}

impl TenantUser {
    pub fn can_manage_leave(&self) -> bool {
        self.role.can_manage_leave()
    }

    pub fn actor(&self) -> LeaveActor {
        LeaveActor::new(self.employee_id.clone(), self.role)
    }
}

/// Tenant database handle for the current request.
#[derive(Clone)]
pub struct TenantContext {
    pub tenant: ResolvedTenant,
    pub pool: DbPool,
}

/// Either kind of authenticated principal.
#[derive(Clone)]
pub enum Principal {
    PlatformAdmin(PlatformAdminUser),
    TenantUser(TenantUser, TenantContext),
}

/// Validate a bearer token against the request scope.
pub async fn authenticate(state: &AppState, scope: &TenantScope, token: &str) -> Result<Principal, Error> {
    let claims = state.auth.verify(token)?;

    match (scope, claims.kind) {
        (TenantScope::Platform, PrincipalKind::PlatformAdmin) => {
            let admin = match db::get_platform_admin(&state.db, &claims.sub).await {
                Ok(admin) => admin,
                Err(Error::NotFound(_)) => return Err(Error::Unauthenticated),
                Err(e) => return Err(e),
            };
            Ok(Principal::PlatformAdmin(PlatformAdminUser {
                admin_id: admin.id,
                email: admin.email,
                display_name: admin.display_name,
            }))
        }
        (TenantScope::Tenant(tenant), PrincipalKind::TenantUser) => {
            if claims.tenant_id.as_deref() != Some(tenant.id.as_str()) {
                tracing::warn!(
                    tenant = %tenant.slug,
                    token_tenant = ?claims.tenant_id,
                    "Rejected token issued for another tenant"
                );
                return Err(Error::TenantMismatch);
            }

            let pool = state.tenant_pools.get(tenant).await?;
            let employee = match db::get_employee(&pool, &claims.sub).await {
                Ok(e) if e.can_sign_in() => e,
                Ok(_) | Err(Error::NotFound(_)) => return Err(Error::Unauthenticated),
                Err(e) => return Err(e),
            };

            let user = TenantUser {
                role: employee.role_enum(),
                employee_id: employee.id,
                email: employee.email,
                display_name: employee.display_name,
                manager_id: employee.manager_id,
                tenant_id: tenant.id.clone(),
            };
            let context = TenantContext {
                tenant: tenant.clone(),
                pool,
            };
            Ok(Principal::TenantUser(user, context))
        }
        // A valid token presented on the wrong kind of host
        _ => Err(Error::Forbidden),
    }
}

fn scope_of(req: &Request<Body>) -> Result<TenantScope, Error> {
    req.extensions()
        .get::<TenantScope>()
        .cloned()
        .ok_or_else(|| Error::Internal("Tenant scope missing; resolve_tenant must run first".into()))
}

fn bearer(header: Option<TypedHeader<Authorization<Bearer>>>) -> Result<String, Error> {
    header
        .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string())
        .ok_or(Error::Unauthenticated)
}

/// Middleware that requires a platform administrator on the platform host.
///
/// Injects [`PlatformAdminUser`].
pub async fn require_platform_admin(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let scope = scope_of(&req)?;
    if !scope.is_platform() {
        return Err(Error::PlatformRequired);
    }

    let token = bearer(auth)?;
    match authenticate(&state, &scope, &token).await? {
        Principal::PlatformAdmin(admin) => {
            req.extensions_mut().insert(admin);
            Ok(next.run(req).await)
        }
        Principal::TenantUser(..) => Err(Error::Forbidden),
    }
}

/// Middleware that requires a user of the tenant the host resolved to.
///
/// Injects [`TenantUser`] and [`TenantContext`].
pub async fn require_tenant_user(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let scope = scope_of(&req)?;
    if scope.is_platform() {
        return Err(Error::TenantRequired);
    }

    let token = bearer(auth)?;
    match authenticate(&state, &scope, &token).await? {
        Principal::TenantUser(user, context) => {
            req.extensions_mut().insert(user);
            req.extensions_mut().insert(context);
            Ok(next.run(req).await)
        }
        Principal::PlatformAdmin(_) => Err(Error::Forbidden),
    }
}

/// Middleware that accepts either principal kind valid for the host.
///
/// Injects [`Principal`].
pub async fn require_principal(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let scope = scope_of(&req)?;
    let token = bearer(auth)?;
    let principal = authenticate(&state, &scope, &token).await?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
