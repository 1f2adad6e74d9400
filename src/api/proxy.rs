//! Proxy Routes
//!
//! Catch-all forwarding of tenant API calls to upstream services.
//!
//! Routes:
//! - ANY /api/:service - Forward to the service root
//! - ANY /api/:service/*path - Forward preserving the path suffix

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, OriginalUri, Path, Request, State},
    http::{header::HOST, Extensions, HeaderMap},
    response::Response,
    routing::any,
    Extension, Router,
};

use crate::middleware::{TenantContext, TenantUser};
use crate::models::new_id;
use crate::services::proxy::X_REQUEST_ID;
use crate::services::ForwardContext;
use crate::{AppState, Error, Result};

/// Build proxy routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/:service", any(forward))
        .route("/:service/*path", any(forward))
}

/// Identity and addressing of the inbound request for upstream calls.
pub(crate) fn forward_context(
    user: &TenantUser,
    ctx: &TenantContext,
    headers: &HeaderMap,
    extensions: &Extensions,
) -> ForwardContext {
    let request_id = headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(new_id);

    ForwardContext {
        tenant: ctx.tenant.clone(),
        user_id: user.employee_id.clone(),
        role: user.role.as_str().to_string(),
        request_id,
        host: headers.get(HOST).and_then(|v| v.to_str().ok()).map(String::from),
        client_ip: extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string()),
    }
}

/// Path after `/api/{service}`, taken from the raw URI so percent-encoding
/// survives.
fn path_suffix<'a>(uri_path: &'a str, service: &str) -> &'a str {
    uri_path
        .strip_prefix("/api/")
        .and_then(|rest| rest.strip_prefix(service))
        .unwrap_or("")
}

/// Forward a request to an upstream service.
///
/// ANY /api/:service/*path
async fn forward(
    State(state): State<AppState>,
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    Path(params): Path<HashMap<String, String>>,
    OriginalUri(original): OriginalUri,
    req: Request<Body>,
) -> Result<Response<Body>> {
    let service = params
        .get("service")
        .ok_or_else(|| Error::Internal("Missing service path parameter".into()))?;

    let forward = forward_context(&user, &ctx, req.headers(), req.extensions());
    let suffix = path_suffix(original.path(), service);

    state.proxy.forward(service, suffix, req, forward).await
}
