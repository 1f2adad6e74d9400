//! Tenant identity as seen by the gateway.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    #[default]
    Active,
    Suspended,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(TenantStatus::Active),
            "suspended" => Some(TenantStatus::Suspended),
            _ => None,
        }
    }
}

/// A tenant the current request has been routed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTenant {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub database_name: String,
}

/// Outcome of domain resolution for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantScope {
    /// The platform console (root, `admin.` or `www.` host).
    Platform,
    /// A tenant subdomain or custom domain.
    Tenant(ResolvedTenant),
}

impl TenantScope {
    pub fn tenant(&self) -> Option<&ResolvedTenant> {
        match self {
            TenantScope::Tenant(t) => Some(t),
            TenantScope::Platform => None,
        }
    }

    pub fn is_platform(&self) -> bool {
        matches!(self, TenantScope::Platform)
    }
}

/// Validate a tenant slug: a single DNS label.
pub fn is_valid_slug(slug: &str) -> bool {
    const RESERVED: &[&str] = &["admin", "www", "api", "app"];

    !slug.is_empty()
        && slug.len() <= 63
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !RESERVED.contains(&slug)
}

/// Validate a fully qualified custom domain.
pub fn is_valid_domain(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && domain.len() <= 253
        && labels.iter().all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        })
}
