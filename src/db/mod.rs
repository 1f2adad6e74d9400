//! Database layer for officegate.
//!
//! Provides SQLite connection pooling for the control-plane database and
//! the per-tenant databases, plus query modules for every entity.

mod admins;
mod employees;
mod leave;
mod pool;
mod tenants;

pub use admins::*;
pub use employees::*;
pub use leave::*;
pub use pool::{create_pool, health_check, PoolConfig, TenantPools, IN_MEMORY};
pub use tenants::*;

use crate::Result;
use tracing::info;

/// Type alias for the SQLite connection pool.
pub type DbPool = sqlx::SqlitePool;

/// Initialize the control-plane connection pool.
///
/// Creates parent directories if needed. `:memory:` yields a single
/// long-lived connection.
pub async fn init_pool(path: &str) -> Result<DbPool> {
    let pool = create_pool(path, PoolConfig::default()).await?;
    info!("Database pool initialized: {}", path);
    Ok(pool)
}

/// Initialize the control-plane schema.
///
/// Applies the complete schema from schema.sql. Uses IF NOT EXISTS
/// clauses so it's safe to run multiple times.
pub async fn initialize_schema(pool: &DbPool) -> Result<()> {
    info!("Initializing control-plane schema");
    apply_schema(pool, include_str!("../../schema.sql")).await?;
    info!("Control-plane schema initialized successfully");
    Ok(())
}

/// Initialize a tenant database schema from tenant_schema.sql.
pub async fn initialize_tenant_schema(pool: &DbPool) -> Result<()> {
    apply_schema(pool, include_str!("../../tenant_schema.sql")).await
}

async fn apply_schema(pool: &DbPool, schema: &str) -> Result<()> {
    for statement in split_statements(schema) {
        sqlx::query(&statement).execute(pool).await?;
    }
    Ok(())
}

/// Split a schema script into statements.
///
/// Comment lines are dropped before splitting on `;` so punctuation inside
/// comments never ends a statement.
fn split_statements(schema: &str) -> Vec<String> {
    let sql: String = schema
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(String::from)
        .collect()
}

/// Map a unique-constraint violation to `AlreadyExists`.
pub(crate) fn map_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> crate::Error {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            crate::Error::AlreadyExists(what())
        }
        _ => crate::Error::Database(err),
    }
}
