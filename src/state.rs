//! Application state for officegate.
//!
//! Contains the shared state that is passed to all handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{self, Config};
use crate::db::{DbPool, TenantPools};
use crate::services::{AuthService, DomainResolver, ProxyService, SearchService, TenantService};
use crate::Result;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Control-plane database pool.
    pub db: DbPool,
    /// Lazily opened tenant database pools.
    pub tenant_pools: TenantPools,
    /// Host to tenant resolution.
    pub resolver: DomainResolver,
    /// Token and password handling.
    pub auth: AuthService,
    /// Tenant provisioning for the console.
    pub tenants: TenantService,
    /// Upstream reverse proxy.
    pub proxy: ProxyService,
    /// Global search fan-out.
    pub search: SearchService,
    pub config: Arc<Config>,
}

impl AppState {
    /// Create the application state from the global configuration.
    pub async fn new() -> Result<Self> {
        Self::from_config(config::config().clone()).await
    }

    /// Create the application state from an explicit configuration.
    ///
    /// Opens the control-plane database, applies its schema and creates the
    /// bootstrap platform administrator if one is configured.
    pub async fn from_config(config: Config) -> Result<Self> {
        let db = crate::db::init_pool(&config.database.path).await?;
        crate::db::initialize_schema(&db).await?;

        let tenant_pools = TenantPools::new(config.database.tenant_data_dir.as_ref().map(PathBuf::from));
        let resolver = DomainResolver::new(
            db.clone(),
            config.gateway.root_domain.clone(),
            config.gateway.allow_tenant_header,
            config.gateway.tenant_cache_ttl,
        );
        let auth = AuthService::new(config.auth.clone());
        let tenants = TenantService::new(db.clone(), tenant_pools.clone(), resolver.clone(), auth.clone());
        let proxy = ProxyService::new(config.gateway.upstreams.clone(), config.gateway.proxy_timeout)?;
        let search = SearchService::new(proxy.clone());

        auth.bootstrap_platform_admin(&db).await?;

        Ok(Self {
            db,
            tenant_pools,
            resolver,
            auth,
            tenants,
            proxy,
            search,
            config: Arc::new(config),
        })
    }
}
