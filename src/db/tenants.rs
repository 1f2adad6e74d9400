//! Tenant and tenant-domain queries (control-plane database).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{map_unique, DbPool};
use crate::models::{ResolvedTenant, TenantStatus};
use crate::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Tenant record from the control-plane database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub database_name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Tenant {
    pub fn status_enum(&self) -> TenantStatus {
        TenantStatus::from_str(&self.status).unwrap_or(TenantStatus::Suspended)
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none() && self.status_enum() == TenantStatus::Active
    }

    pub fn resolved(&self) -> ResolvedTenant {
        ResolvedTenant {
            id: self.id.clone(),
            slug: self.slug.clone(),
            name: self.name.clone(),
            database_name: self.database_name.clone(),
        }
    }
}

/// Custom domain mapped to a tenant.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TenantDomain {
    pub id: String,
    pub tenant_id: String,
    pub domain: String,
    pub is_primary: bool,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a tenant.
#[derive(Debug, Clone)]
pub struct CreateTenant {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub database_name: String,
}

/// Input for updating a tenant.
#[derive(Debug, Clone, Default)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub status: Option<TenantStatus>,
}

/// Input for adding a custom domain.
#[derive(Debug, Clone)]
pub struct CreateTenantDomain {
    pub id: String,
    pub tenant_id: String,
    pub domain: String,
    pub is_primary: bool,
    pub verified: bool,
}

// ============================================================================
// Tenant Queries
// ============================================================================

/// Create a new tenant.
pub async fn create_tenant<'e, E>(executor: E, input: CreateTenant) -> Result<Tenant>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = Utc::now();
    sqlx::query_as::<_, Tenant>(
        r#"
        INSERT INTO tenants (id, slug, name, database_name, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'active', ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.slug)
    .bind(&input.name)
    .bind(&input.database_name)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(|e| map_unique(e, || format!("Tenant with slug {} already exists", input.slug)))
}

/// Get a tenant by ID (including soft-deleted ones).
pub async fn get_tenant(pool: &DbPool, id: &str) -> Result<Tenant> {
    sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Tenant {}", id)))
}

/// Get a live tenant by slug.
pub async fn get_tenant_by_slug(pool: &DbPool, slug: &str) -> Result<Option<Tenant>> {
    let tenant = sqlx::query_as::<_, Tenant>(
        "SELECT * FROM tenants WHERE slug = ? AND deleted_at IS NULL",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(tenant)
}

/// Find the live tenant owning a verified custom domain.
pub async fn get_tenant_by_domain(pool: &DbPool, domain: &str) -> Result<Option<Tenant>> {
    let tenant = sqlx::query_as::<_, Tenant>(
        r#"
        SELECT t.*
        FROM tenants t
        INNER JOIN tenant_domains d ON d.tenant_id = t.id
        WHERE d.domain = ? AND d.verified = 1 AND t.deleted_at IS NULL
        "#,
    )
    .bind(domain)
    .fetch_optional(pool)
    .await?;
    Ok(tenant)
}

/// List live tenants.
pub async fn list_tenants(pool: &DbPool) -> Result<Vec<Tenant>> {
    let tenants = sqlx::query_as::<_, Tenant>(
        "SELECT * FROM tenants WHERE deleted_at IS NULL ORDER BY created_at, slug",
    )
    .fetch_all(pool)
    .await?;
    Ok(tenants)
}

/// Update a tenant's name or status.
pub async fn update_tenant(pool: &DbPool, id: &str, input: UpdateTenant) -> Result<Tenant> {
    let existing = get_tenant(pool, id).await?;
    if existing.deleted_at.is_some() {
        return Err(Error::NotFound(format!("Tenant {}", id)));
    }

    let name = input.name.unwrap_or(existing.name);
    let status = input
        .status
        .map(|s| s.as_str().to_string())
        .unwrap_or(existing.status);

    let tenant = sqlx::query_as::<_, Tenant>(
        r#"
        UPDATE tenants SET name = ?, status = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(&status)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(tenant)
}

/// Soft-delete a tenant. Its domains are released.
pub async fn delete_tenant(pool: &DbPool, id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE tenants SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(Utc::now())
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Tenant {}", id)));
    }

    sqlx::query("DELETE FROM tenant_domains WHERE tenant_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

// ============================================================================
// Domain Queries
// ============================================================================

/// Add a custom domain to a tenant.
pub async fn add_tenant_domain(pool: &DbPool, input: CreateTenantDomain) -> Result<TenantDomain> {
    let mut tx = pool.begin().await?;

    if input.is_primary {
        sqlx::query("UPDATE tenant_domains SET is_primary = 0 WHERE tenant_id = ?")
            .bind(&input.tenant_id)
            .execute(&mut *tx)
            .await?;
    }

    let domain = sqlx::query_as::<_, TenantDomain>(
        r#"
        INSERT INTO tenant_domains (id, tenant_id, domain, is_primary, verified, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.tenant_id)
    .bind(&input.domain)
    .bind(input.is_primary)
    .bind(input.verified)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_unique(e, || format!("Domain {} is already mapped", input.domain)))?;

    tx.commit().await?;
    Ok(domain)
}

/// List a tenant's custom domains.
pub async fn list_tenant_domains(pool: &DbPool, tenant_id: &str) -> Result<Vec<TenantDomain>> {
    let domains = sqlx::query_as::<_, TenantDomain>(
        "SELECT * FROM tenant_domains WHERE tenant_id = ? ORDER BY is_primary DESC, domain",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(domains)
}

/// Remove a custom domain, returning the removed record.
pub async fn delete_tenant_domain(
    pool: &DbPool,
    tenant_id: &str,
    domain_id: &str,
) -> Result<TenantDomain> {
    sqlx::query_as::<_, TenantDomain>(
        "DELETE FROM tenant_domains WHERE id = ? AND tenant_id = ? RETURNING *",
    )
    .bind(domain_id)
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Domain {}", domain_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_pool, initialize_schema, IN_MEMORY};

    async fn setup() -> DbPool {
        let pool = init_pool(IN_MEMORY).await.unwrap();
        initialize_schema(&pool).await.unwrap();
        pool
    }

    fn acme() -> CreateTenant {
        CreateTenant {
            id: "t-acme".into(),
            slug: "acme".into(),
            name: "Acme Corp".into(),
            database_name: "tenant_acme".into(),
        }
    }

    #[tokio::test]
    async fn test_tenant_crud() {
        let pool = setup().await;
        let tenant = create_tenant(&pool, acme()).await.unwrap();
        assert!(tenant.is_active());

        let found = get_tenant_by_slug(&pool, "acme").await.unwrap().unwrap();
        assert_eq!(found.id, "t-acme");

        let updated = update_tenant(
            &pool,
            "t-acme",
            UpdateTenant {
                name: None,
                status: Some(TenantStatus::Suspended),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Acme Corp");
        assert!(!updated.is_active());

        delete_tenant(&pool, "t-acme").await.unwrap();
        assert!(get_tenant_by_slug(&pool, "acme").await.unwrap().is_none());
        assert!(list_tenants(&pool).await.unwrap().is_empty());
        assert!(matches!(delete_tenant(&pool, "t-acme").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_slug() {
        let pool = setup().await;
        create_tenant(&pool, acme()).await.unwrap();
        let mut dup = acme();
        dup.id = "t-other".into();
        dup.database_name = "tenant_other".into();
        assert!(matches!(create_tenant(&pool, dup).await, Err(Error::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_domain_lookup_requires_verification() {
        let pool = setup().await;
        create_tenant(&pool, acme()).await.unwrap();

        add_tenant_domain(
            &pool,
            CreateTenantDomain {
                id: "d1".into(),
                tenant_id: "t-acme".into(),
                domain: "hr.acme.com".into(),
                is_primary: true,
                verified: false,
            },
        )
        .await
        .unwrap();
        assert!(get_tenant_by_domain(&pool, "hr.acme.com").await.unwrap().is_none());

        add_tenant_domain(
            &pool,
            CreateTenantDomain {
                id: "d2".into(),
                tenant_id: "t-acme".into(),
                domain: "people.acme.com".into(),
                is_primary: true,
                verified: true,
            },
        )
        .await
        .unwrap();
        let tenant = get_tenant_by_domain(&pool, "people.acme.com").await.unwrap().unwrap();
        assert_eq!(tenant.slug, "acme");

        let domains = list_tenant_domains(&pool, "t-acme").await.unwrap();
        assert_eq!(domains.len(), 2);
        assert_eq!(domains.iter().filter(|d| d.is_primary).count(), 1);

        delete_tenant_domain(&pool, "t-acme", "d2").await.unwrap();
        assert!(get_tenant_by_domain(&pool, "people.acme.com").await.unwrap().is_none());
    }
}
