//! API Routes for officegate
//!
//! This module combines all API routes into a single router.
//! Routes are organized by audience and apply appropriate middleware.

mod auth;
mod console;
mod employees;
mod extract;
mod leave;
mod proxy;
mod search;
pub mod status;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{HeaderName, Request},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::{require_platform_admin, require_tenant_user, resolve_tenant};
use crate::services::proxy::X_REQUEST_ID;
use crate::AppState;

/// Build the complete application with tracing, request ids and CORS.
pub fn router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(X_REQUEST_ID);
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .merge(routes(state.clone()))
        // Applies to body extractors only, proxied bodies keep streaming
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            let request_id = req
                .headers()
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                request_id = %request_id,
                tenant = tracing::field::Empty,
            )
        }))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Build the API routes.
///
/// Route structure:
/// - /health/* - Health checks (public, no tenant resolution)
/// - /auth/* - Login and current principal (any host)
/// - /console/* - Tenant administration (platform host, platform admin)
/// - /api/* - Employees, leave, search and upstream proxy (tenant host, tenant user)
pub fn routes(state: AppState) -> Router<AppState> {
    let scoped = Router::new()
        .nest("/auth", auth::routes(state.clone()))
        .nest("/console", console_routes(state.clone()))
        .nest("/api", tenant_routes(state.clone()))
        // Added last so it runs before the auth layers of the nested routers
        .layer(axum::middleware::from_fn_with_state(state, resolve_tenant));

    Router::new().merge(status::routes()).merge(scoped)
}

/// Platform console routes.
fn console_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(console::routes())
        .layer(axum::middleware::from_fn_with_state(state, require_platform_admin))
}

/// Tenant routes. Anything not served locally is proxied to an upstream.
fn tenant_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(employees::routes())
        .nest("/leave", leave::routes())
        .merge(search::routes())
        .merge(proxy::routes())
        .layer(axum::middleware::from_fn_with_state(state, require_tenant_user))
}
