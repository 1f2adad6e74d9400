//! Tenant resolution middleware.
//!
//! Runs in front of every tenant-aware route and inserts the resolved
//! [`TenantScope`] into request extensions. Unknown hosts are rejected with
//! 404 and suspended tenants with 403 before any handler runs.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::HOST,
    middleware::Next,
    response::Response,
};
use tracing::Span;

use crate::{error::Error, models::TenantScope, AppState};

/// Development override naming the tenant explicitly.
pub const TENANT_SLUG_HEADER: &str = "x-tenant-slug";

/// Middleware that resolves the tenant from the `Host` header.
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/auth/login", post(login))
///     .layer(middleware::from_fn_with_state(state.clone(), resolve_tenant));
/// ```
pub async fn resolve_tenant(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    // HTTP/2 clients send :authority, which surfaces in the URI
    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .or_else(|| req.uri().authority().map(|a| a.to_string()));

    let tenant_header = req
        .headers()
        .get(TENANT_SLUG_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let scope = state
        .resolver
        .resolve(host.as_deref(), tenant_header.as_deref())
        .await?;

    if let TenantScope::Tenant(tenant) = &scope {
        Span::current().record("tenant", tenant.slug.as_str());
    }

    req.extensions_mut().insert(scope);
    Ok(next.run(req).await)
}
