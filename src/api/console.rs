//! Console Routes
//!
//! Tenant administration for platform administrators.
//!
//! Routes:
//! - GET /console/tenants - List tenants
//! - POST /console/tenants - Provision a tenant
//! - GET /console/tenants/:id - Tenant with its custom domains
//! - PATCH /console/tenants/:id - Rename, suspend or activate
//! - DELETE /console/tenants/:id - Soft delete
//! - POST /console/tenants/:id/domains - Add a custom domain
//! - DELETE /console/tenants/:id/domains/:domain_id - Remove a custom domain

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use tracing::info;

use super::extract::ApiJson;
use crate::db::{Tenant, TenantDomain};
use crate::middleware::PlatformAdminUser;
use crate::services::{NewDomain, NewTenant, ProvisionedTenant, TenantChanges, TenantDetail};
use crate::{AppState, Result};

/// Build console routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tenants", get(list_tenants).post(create_tenant))
        .route(
            "/tenants/:id",
            get(get_tenant).patch(update_tenant).delete(delete_tenant),
        )
        .route("/tenants/:id/domains", post(add_domain))
        .route("/tenants/:id/domains/:domain_id", delete(remove_domain))
}

/// List tenants.
///
/// GET /console/tenants
#[axum::debug_handler]
async fn list_tenants(State(state): State<AppState>) -> Result<Json<Vec<Tenant>>> {
    Ok(Json(state.tenants.list().await?))
}

/// Provision a tenant with its database and first administrator.
///
/// POST /console/tenants
#[axum::debug_handler]
async fn create_tenant(
    State(state): State<AppState>,
    Extension(admin): Extension<PlatformAdminUser>,
    ApiJson(input): ApiJson<NewTenant>,
) -> Result<(StatusCode, Json<ProvisionedTenant>)> {
    let provisioned = state.tenants.create(input).await?;
    info!(
        admin_id = %admin.admin_id,
        tenant = %provisioned.tenant.slug,
        "Tenant created from console"
    );
    Ok((StatusCode::CREATED, Json(provisioned)))
}

/// GET /console/tenants/:id
#[axum::debug_handler]
async fn get_tenant(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<TenantDetail>> {
    Ok(Json(state.tenants.get(&id).await?))
}

/// PATCH /console/tenants/:id
#[axum::debug_handler]
async fn update_tenant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(changes): ApiJson<TenantChanges>,
) -> Result<Json<Tenant>> {
    Ok(Json(state.tenants.update(&id, changes).await?))
}

/// DELETE /console/tenants/:id
#[axum::debug_handler]
async fn delete_tenant(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    state.tenants.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /console/tenants/:id/domains
#[axum::debug_handler]
async fn add_domain(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<NewDomain>,
) -> Result<(StatusCode, Json<TenantDomain>)> {
    let domain = state.tenants.add_domain(&id, input).await?;
    Ok((StatusCode::CREATED, Json(domain)))
}

/// DELETE /console/tenants/:id/domains/:domain_id
#[axum::debug_handler]
async fn remove_domain(
    State(state): State<AppState>,
    Path((id, domain_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.tenants.remove_domain(&id, &domain_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
