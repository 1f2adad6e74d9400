//! Tenant provisioning and custom domain management for the platform console.
//!
//! Every mutation invalidates the domain resolver so routing changes take
//! effect immediately instead of after the cache TTL.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::auth::AuthService;
use super::calendar::WorkWeek;
use super::tenancy::DomainResolver;
use crate::db::{
    self, CreateEmployee, CreateTenant, CreateTenantDomain, DbPool, Employee, Tenant, TenantDomain, TenantPools,
    UpdateTenant,
};
use crate::error::{Error, Result};
use crate::models::{is_valid_domain, is_valid_slug, new_id, EmployeeRole, TenantStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTenant {
    pub slug: String,
    pub name: String,
    /// First tenant administrator.
    pub admin_email: String,
    pub admin_password: String,
    #[serde(default)]
    pub admin_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<TenantStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDomain {
    pub domain: String,
    #[serde(default)]
    pub is_primary: bool,
    /// Domains are trusted as verified unless stated otherwise.
    #[serde(default = "default_verified")]
    pub verified: bool,
}

fn default_verified() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedTenant {
    pub tenant: Tenant,
    pub admin: Employee,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantDetail {
    #[serde(flatten)]
    pub tenant: Tenant,
    pub domains: Vec<TenantDomain>,
}

#[derive(Clone)]
pub struct TenantService {
    db: DbPool,
    pools: TenantPools,
    resolver: DomainResolver,
    auth: AuthService,
}

impl TenantService {
    pub fn new(db: DbPool, pools: TenantPools, resolver: DomainResolver, auth: AuthService) -> Self {
        Self {
            db,
            pools,
            resolver,
            auth,
        }
    }

    pub async fn list(&self) -> Result<Vec<Tenant>> {
        db::list_tenants(&self.db).await
    }

    pub async fn get(&self, id: &str) -> Result<TenantDetail> {
        let tenant = self.live_tenant(id).await?;
        let domains = db::list_tenant_domains(&self.db, id).await?;
        Ok(TenantDetail { tenant, domains })
    }

    /// Register a tenant, create its database with the default working week
    /// and its first administrator.
    pub async fn create(&self, input: NewTenant) -> Result<ProvisionedTenant> {
        let slug = input.slug.trim().to_lowercase();
        if !is_valid_slug(&slug) {
            return Err(Error::Validation(format!(
                "'{}' is not a valid tenant slug (lowercase letters, digits and hyphens)",
                slug
            )));
        }
        let name = input.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Tenant name is required".into()));
        }
        let admin_email = input.admin_email.trim().to_lowercase();
        if !admin_email.contains('@') {
            return Err(Error::Validation("A valid admin email is required".into()));
        }
        let password_hash = self.auth.hash_password(&input.admin_password).await?;

        // The control row only commits once the tenant database is ready, so
        // a failed provisioning can be retried with the same slug.
        let mut tx = self.db.begin().await?;
        let tenant = db::create_tenant(
            &mut *tx,
            CreateTenant {
                id: new_id(),
                slug: slug.clone(),
                name: name.to_string(),
                database_name: format!("tenant_{}", slug.replace('-', "_")),
            },
        )
        .await?;

        let admin = match self
            .provision_database(&tenant, admin_email, input.admin_name, password_hash)
            .await
        {
            Ok(admin) => admin,
            Err(err) => {
                self.pools.evict(&tenant.id).await;
                warn!(tenant = %tenant.slug, error = %err, "Tenant provisioning failed");
                return Err(err);
            }
        };
        if let Err(err) = tx.commit().await {
            self.pools.evict(&tenant.id).await;
            return Err(err.into());
        }

        self.resolver.invalidate(&tenant.id).await;
        info!(tenant = %tenant.slug, database = %tenant.database_name, "Provisioned tenant");

        Ok(ProvisionedTenant { tenant, admin })
    }

    /// Open the tenant database, seed the working week and add the first
    /// administrator.
    async fn provision_database(
        &self,
        tenant: &Tenant,
        email: String,
        display_name: Option<String>,
        password_hash: String,
    ) -> Result<Employee> {
        let pool = self.pools.get(&tenant.resolved()).await?;
        db::replace_working_days(&pool, &WorkWeek::default()).await?;
        db::create_employee(
            &pool,
            CreateEmployee {
                id: new_id(),
                email,
                display_name: display_name.unwrap_or_else(|| "Administrator".to_string()),
                password_hash,
                role: EmployeeRole::Admin,
                manager_id: None,
            },
        )
        .await
    }

    pub async fn update(&self, id: &str, changes: TenantChanges) -> Result<Tenant> {
        let name = match changes.name {
            Some(name) if name.trim().is_empty() => {
                return Err(Error::Validation("Tenant name must not be empty".into()))
            }
            other => other.map(|n| n.trim().to_string()),
        };

        let tenant = db::update_tenant(
            &self.db,
            id,
            UpdateTenant {
                name,
                status: changes.status,
            },
        )
        .await?;

        self.resolver.invalidate(id).await;
        info!(tenant = %tenant.slug, status = %tenant.status, "Updated tenant");
        Ok(tenant)
    }

    /// Soft-delete a tenant and close its database.
    pub async fn delete(&self, id: &str) -> Result<()> {
        db::delete_tenant(&self.db, id).await?;
        self.pools.evict(id).await;
        self.resolver.invalidate(id).await;
        info!(tenant_id = %id, "Deleted tenant");
        Ok(())
    }

    pub async fn add_domain(&self, tenant_id: &str, input: NewDomain) -> Result<TenantDomain> {
        let tenant = self.live_tenant(tenant_id).await?;

        let domain = input.domain.trim().trim_end_matches('.').to_lowercase();
        if !is_valid_domain(&domain) {
            return Err(Error::Validation(format!("'{}' is not a valid domain", domain)));
        }
        let root = self.resolver.root_domain();
        if domain == root || domain.ends_with(&format!(".{}", root)) {
            return Err(Error::Validation(format!(
                "Custom domains may not live under the platform domain {}",
                root
            )));
        }

        let record = db::add_tenant_domain(
            &self.db,
            CreateTenantDomain {
                id: new_id(),
                tenant_id: tenant.id.clone(),
                domain,
                is_primary: input.is_primary,
                verified: input.verified,
            },
        )
        .await?;

        self.resolver.invalidate(&tenant.id).await;
        info!(tenant = %tenant.slug, domain = %record.domain, "Added custom domain");
        Ok(record)
    }

    pub async fn remove_domain(&self, tenant_id: &str, domain_id: &str) -> Result<TenantDomain> {
        let removed = db::delete_tenant_domain(&self.db, tenant_id, domain_id).await?;
        self.resolver.invalidate(tenant_id).await;
        info!(tenant_id = %tenant_id, domain = %removed.domain, "Removed custom domain");
        Ok(removed)
    }

    async fn live_tenant(&self, id: &str) -> Result<Tenant> {
        let tenant = db::get_tenant(&self.db, id).await?;
        if tenant.deleted_at.is_some() {
            return Err(Error::NotFound(format!("Tenant {}", id)));
        }
        Ok(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::db::{init_pool, initialize_schema, IN_MEMORY};
    use crate::models::TenantScope;
    use std::path::PathBuf;
    use std::time::Duration;

    async fn setup() -> (TenantService, DomainResolver, TenantPools) {
        setup_with_data_dir(None).await
    }

    async fn setup_with_data_dir(data_dir: Option<PathBuf>) -> (TenantService, DomainResolver, TenantPools) {
        let db = init_pool(IN_MEMORY).await.unwrap();
        initialize_schema(&db).await.unwrap();

        let pools = TenantPools::new(data_dir);
        let resolver = DomainResolver::new(db.clone(), "example.com", false, Duration::from_secs(60));
        let auth = AuthService::new(AuthConfig {
            jwt_secret: "secret".into(),
            issuer: "officegate-test".into(),
            token_ttl_secs: 3600,
            bcrypt_cost: 4,
            bootstrap_admin: None,
        });
        let service = TenantService::new(db, pools.clone(), resolver.clone(), auth);
        (service, resolver, pools)
    }

    fn acme() -> NewTenant {
        NewTenant {
            slug: "Acme".into(),
            name: "Acme Corp".into(),
            admin_email: "Boss@Acme.com".into(),
            admin_password: "password123".into(),
            admin_name: None,
        }
    }

    #[tokio::test]
    async fn test_create_provisions_database() {
        let (service, resolver, pools) = setup().await;

        // Negative lookup cached before the tenant exists
        assert!(resolver.resolve(Some("acme.example.com"), None).await.is_err());

        let provisioned = service.create(acme()).await.unwrap();
        assert_eq!(provisioned.tenant.slug, "acme");
        assert_eq!(provisioned.tenant.database_name, "tenant_acme");
        assert_eq!(provisioned.admin.email, "boss@acme.com");
        assert_eq!(provisioned.admin.role, "admin");

        let pool = pools.get(&provisioned.tenant.resolved()).await.unwrap();
        assert_eq!(db::get_working_day_rows(&pool).await.unwrap().len(), 7);

        let scope = resolver.resolve(Some("acme.example.com"), None).await.unwrap();
        assert!(matches!(scope, TenantScope::Tenant(t) if t.slug == "acme"));

        assert!(matches!(service.create(acme()).await, Err(Error::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_failed_provisioning_can_be_retried() {
        let dir = tempfile::tempdir().unwrap();
        let (service, resolver, pools) = setup_with_data_dir(Some(dir.path().to_path_buf())).await;

        // A directory where the database file belongs makes the open fail
        let blocker = dir.path().join("tenant_acme.db");
        std::fs::create_dir(&blocker).unwrap();

        assert!(service.create(acme()).await.is_err());
        assert!(service.list().await.unwrap().is_empty());
        assert_eq!(pools.open_count().await, 0);
        assert!(resolver.resolve(Some("acme.example.com"), None).await.is_err());

        std::fs::remove_dir(&blocker).unwrap();
        let provisioned = service.create(acme()).await.unwrap();
        assert_eq!(provisioned.tenant.slug, "acme");
        assert_eq!(service.list().await.unwrap().len(), 1);
        assert!(resolver.resolve(Some("acme.example.com"), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (service, _, _) = setup().await;
        let mut bad = acme();
        bad.slug = "admin".into();
        assert!(matches!(service.create(bad).await, Err(Error::Validation(_))));

        let mut weak = acme();
        weak.admin_password = "short".into();
        assert!(matches!(service.create(weak).await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_domains_and_deletion() {
        let (service, resolver, pools) = setup().await;
        let tenant = service.create(acme()).await.unwrap().tenant;

        assert!(matches!(
            service
                .add_domain(&tenant.id, NewDomain { domain: "x.example.com".into(), is_primary: false, verified: true })
                .await,
            Err(Error::Validation(_))
        ));

        let domain = service
            .add_domain(&tenant.id, NewDomain { domain: "Office.Acme.com.".into(), is_primary: true, verified: true })
            .await
            .unwrap();
        assert_eq!(domain.domain, "office.acme.com");
        assert!(resolver.resolve(Some("office.acme.com"), None).await.is_ok());

        service.remove_domain(&tenant.id, &domain.id).await.unwrap();
        assert!(resolver.resolve(Some("office.acme.com"), None).await.is_err());

        service.delete(&tenant.id).await.unwrap();
        assert_eq!(pools.open_count().await, 0);
        assert!(matches!(
            resolver.resolve(Some("acme.example.com"), None).await,
            Err(Error::TenantNotFound(_))
        ));
        assert!(matches!(service.get(&tenant.id).await, Err(Error::NotFound(_))));
    }
}
