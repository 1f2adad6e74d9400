//! Platform administrator queries (control-plane database).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{map_unique, DbPool};
use crate::{Error, Result};

/// Platform administrator record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PlatformAdmin {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Input for creating a platform administrator.
#[derive(Debug, Clone)]
pub struct CreatePlatformAdmin {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: String,
}

pub async fn create_platform_admin(pool: &DbPool, input: CreatePlatformAdmin) -> Result<PlatformAdmin> {
    sqlx::query_as::<_, PlatformAdmin>(
        r#"
        INSERT INTO platform_admins (id, email, display_name, password_hash, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(input.email.trim().to_lowercase())
    .bind(&input.display_name)
    .bind(&input.password_hash)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|e| map_unique(e, || format!("Platform admin {} already exists", input.email)))
}

pub async fn get_platform_admin(pool: &DbPool, id: &str) -> Result<PlatformAdmin> {
    sqlx::query_as::<_, PlatformAdmin>("SELECT * FROM platform_admins WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Platform admin {}", id)))
}

pub async fn get_platform_admin_by_email(pool: &DbPool, email: &str) -> Result<Option<PlatformAdmin>> {
    let admin = sqlx::query_as::<_, PlatformAdmin>(
        "SELECT * FROM platform_admins WHERE email = ? COLLATE NOCASE",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(admin)
}

pub async fn count_platform_admins(pool: &DbPool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM platform_admins")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn record_admin_login(pool: &DbPool, id: &str) -> Result<()> {
    sqlx::query("UPDATE platform_admins SET last_login = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
