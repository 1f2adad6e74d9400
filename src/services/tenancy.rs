//! Domain-based tenant resolution.
//!
//! Maps the `Host` header of an inbound request to a [`TenantScope`]:
//! - `<root>`, `admin.<root>` and `www.<root>` serve the platform console
//! - `<slug>.<root>` serves the tenant with that slug
//! - any other host is looked up as a verified custom domain
//!
//! Lookups are cached for a short TTL. The console clears the cache whenever
//! a tenant or domain changes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::db::{self, DbPool, Tenant};
use crate::error::{Error, Result};
use crate::models::TenantScope;

/// Hosts under the root domain that belong to the platform.
const PLATFORM_LABELS: &[&str] = &["admin", "www"];

#[derive(Debug, Clone)]
struct CacheEntry {
    tenant: Option<Tenant>,
    expires_at: Instant,
}

/// Resolves hosts to tenants with a TTL cache.
#[derive(Clone)]
pub struct DomainResolver {
    db: DbPool,
    root_domain: String,
    allow_tenant_header: bool,
    ttl: Duration,
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl DomainResolver {
    pub fn new(db: DbPool, root_domain: impl Into<String>, allow_tenant_header: bool, ttl: Duration) -> Self {
        Self {
            db,
            root_domain: root_domain.into(),
            allow_tenant_header,
            ttl,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn root_domain(&self) -> &str {
        &self.root_domain
    }

    /// Resolve the scope of a request.
    ///
    /// `tenant_header` is the value of `X-Tenant-Slug`; it is ignored unless
    /// the override is enabled in configuration.
    pub async fn resolve(&self, host: Option<&str>, tenant_header: Option<&str>) -> Result<TenantScope> {
        if self.allow_tenant_header {
            if let Some(slug) = tenant_header.map(str::trim).filter(|s| !s.is_empty()) {
                let slug = slug.to_lowercase();
                let tenant = self.lookup(CacheKey::Slug(&slug)).await?;
                return scope_for(tenant, &slug);
            }
        }

        let host = host
            .and_then(normalize_host)
            .ok_or_else(|| Error::TenantNotFound(host.unwrap_or_default().to_string()))?;

        if host == self.root_domain {
            return Ok(TenantScope::Platform);
        }

        if let Some(label) = self.subdomain_label(&host) {
            if PLATFORM_LABELS.contains(&label) {
                return Ok(TenantScope::Platform);
            }
            let tenant = self.lookup(CacheKey::Slug(label)).await?;
            return scope_for(tenant, &host);
        }

        let tenant = self.lookup(CacheKey::Domain(&host)).await?;
        scope_for(tenant, &host)
    }

    /// The single label in front of the root domain, if the host has exactly one.
    fn subdomain_label<'a>(&self, host: &'a str) -> Option<&'a str> {
        let prefix = host.strip_suffix(self.root_domain.as_str())?.strip_suffix('.')?;
        (!prefix.is_empty() && !prefix.contains('.')).then_some(prefix)
    }

    async fn lookup(&self, key: CacheKey<'_>) -> Result<Option<Tenant>> {
        let cache_key = key.to_string();

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&cache_key) {
                if entry.expires_at > Instant::now() {
                    return Ok(entry.tenant.clone());
                }
            }
        }

        let tenant = match key {
            CacheKey::Slug(slug) => db::get_tenant_by_slug(&self.db, slug).await?,
            CacheKey::Domain(domain) => db::get_tenant_by_domain(&self.db, domain).await?,
        };
        debug!(key = %cache_key, found = tenant.is_some(), "Resolved tenant");

        self.cache.write().await.insert(
            cache_key,
            CacheEntry {
                tenant: tenant.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );

        Ok(tenant)
    }

    /// Drop cached entries for this tenant, and every negative entry since a
    /// new slug or domain may now resolve.
    pub async fn invalidate(&self, tenant_id: &str) {
        self.cache
            .write()
            .await
            .retain(|_, entry| entry.tenant.as_ref().is_some_and(|t| t.id != tenant_id));
    }
}

enum CacheKey<'a> {
    Slug(&'a str),
    Domain(&'a str),
}

impl std::fmt::Display for CacheKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Slug(s) => write!(f, "slug:{}", s),
            CacheKey::Domain(d) => write!(f, "domain:{}", d),
        }
    }
}

fn scope_for(tenant: Option<Tenant>, host: &str) -> Result<TenantScope> {
    let tenant = tenant.ok_or_else(|| Error::TenantNotFound(host.to_string()))?;
    if !tenant.is_active() {
        return Err(Error::TenantSuspended(tenant.slug));
    }
    Ok(TenantScope::Tenant(tenant.resolved()))
}

/// Lowercase the host, strip any port and trailing dot.
pub fn normalize_host(host: &str) -> Option<String> {
    let host = host.trim();
    let without_port = if let Some(rest) = host.strip_prefix('[') {
        // IPv6 literal
        rest.split(']').next().unwrap_or(rest)
    } else {
        host.rsplit_once(':').map_or(host, |(h, port)| {
            if port.chars().all(|c| c.is_ascii_digit()) {
                h
            } else {
                host
            }
        })
    };

    let normalized = without_port.trim_end_matches('.').to_lowercase();
    (!normalized.is_empty()).then_some(normalized)
}
