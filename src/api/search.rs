//! Search Routes
//!
//! Global search across searchable upstream services and the tenant's own
//! leave types and employees.
//!
//! Routes:
//! - GET /api/search?q=&limit= - Aggregated results keyed by source

use axum::{
    extract::{Query, State},
    http::{Extensions, HeaderMap},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;

use super::proxy::forward_context;
use crate::middleware::{TenantContext, TenantUser};
use crate::services::SearchResponse;
use crate::{AppState, Result};

/// Build search routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/search", get(search))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
}

/// Search everywhere.
///
/// GET /api/search?q=&limit=
///
/// A failing upstream is reported under `errors` and does not fail the
/// whole search.
async fn search(
    State(state): State<AppState>,
    Extension(user): Extension<TenantUser>,
    Extension(ctx): Extension<TenantContext>,
    extensions: Extensions,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let forward = forward_context(&user, &ctx, &headers, &extensions);
    let response = state
        .search
        .search(&ctx.pool, &query.q, query.limit, &headers, &forward)
        .await?;
    Ok(Json(response))
}
