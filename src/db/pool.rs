//! SQLite connection pools for the control plane and for every tenant.
//!
//! Each tenant owns a separate database file. Pools are opened lazily on the
//! first request routed to a tenant and kept in a [`TenantPools`] registry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::DbPool;
use crate::models::ResolvedTenant;
use crate::Result;

/// In-memory database marker accepted by [`create_pool`].
pub const IN_MEMORY: &str = ":memory:";

/// Pool configuration options.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections to maintain.
    pub min_connections: u32,
    /// Timeout for acquiring a connection.
    pub acquire_timeout: Duration,
    /// Maximum idle time before a connection is closed.
    pub idle_timeout: Option<Duration>,
    /// Maximum lifetime of a connection.
    pub max_lifetime: Option<Duration>,
    /// SQLite busy timeout.
    pub busy_timeout: Duration,
    /// Cache size in KB (negative values).
    pub cache_size_kb: i64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
            busy_timeout: Duration::from_secs(30),
            cache_size_kb: 64000,
        }
    }
}

impl PoolConfig {
    /// Tenant databases are many and mostly idle; keep them small.
    pub fn tenant() -> Self {
        Self {
            max_connections: 4,
            min_connections: 0,
            cache_size_kb: 8000,
            ..Default::default()
        }
    }

    /// A single connection that never expires, so the in-memory database
    /// lives as long as the pool.
    pub fn in_memory() -> Self {
        Self {
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: None,
            max_lifetime: None,
            busy_timeout: Duration::from_secs(5),
            cache_size_kb: 8000,
        }
    }

    /// Build the connection options for SQLite.
    pub fn build_connect_options(&self, path: &str) -> Result<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout)
            .foreign_keys(true)
            .pragma("cache_size", format!("-{}", self.cache_size_kb))
            .pragma("temp_store", "memory");

        Ok(options)
    }

    /// Build the pool options.
    pub fn build_pool_options(&self) -> SqlitePoolOptions {
        SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
    }
}

/// Create a pool with custom configuration.
pub async fn create_pool_with_config(path: &str, config: PoolConfig) -> Result<DbPool> {
    // Create parent directories if they don't exist
    if path != IN_MEMORY {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }

    let options = config.build_connect_options(path)?;
    let pool = config.build_pool_options().connect_with(options).await?;

    Ok(pool)
}

/// Create a pool, picking the single-connection profile for `:memory:`.
pub async fn create_pool(path: &str, config: PoolConfig) -> Result<DbPool> {
    if path == IN_MEMORY {
        create_pool_with_config(path, PoolConfig::in_memory()).await
    } else {
        create_pool_with_config(path, config).await
    }
}

/// Health check for the database connection.
pub async fn health_check(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Registry of open tenant database pools keyed by tenant id.
#[derive(Clone)]
pub struct TenantPools {
    /// `None` keeps every tenant database in memory.
    data_dir: Option<PathBuf>,
    pools: Arc<RwLock<HashMap<String, DbPool>>>,
}

impl TenantPools {
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        Self {
            data_dir,
            pools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Location of a tenant's database.
    pub fn database_path(&self, database_name: &str) -> String {
        match &self.data_dir {
            Some(dir) => dir
                .join(format!("{}.db", database_name))
                .to_string_lossy()
                .into_owned(),
            None => IN_MEMORY.to_string(),
        }
    }

    /// Get the pool for a tenant, opening it and applying the tenant schema
    /// on first use.
    pub async fn get(&self, tenant: &ResolvedTenant) -> Result<DbPool> {
        if let Some(pool) = self.pools.read().await.get(&tenant.id) {
            return Ok(pool.clone());
        }

        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get(&tenant.id) {
            return Ok(pool.clone());
        }

        let path = self.database_path(&tenant.database_name);
        let pool = create_pool(&path, PoolConfig::tenant()).await?;
        super::initialize_tenant_schema(&pool).await?;

        info!(tenant = %tenant.slug, path = %path, "Opened tenant database");
        pools.insert(tenant.id.clone(), pool.clone());

        Ok(pool)
    }

    /// Close and forget a tenant's pool.
    pub async fn evict(&self, tenant_id: &str) {
        if let Some(pool) = self.pools.write().await.remove(tenant_id) {
            pool.close().await;
            debug!(tenant_id = %tenant_id, "Closed tenant database pool");
        }
    }

    /// Number of tenant pools currently open.
    pub async fn open_count(&self) -> usize {
        self.pools.read().await.len()
    }
}
