//! Middleware for officegate.
//!
//! Provides tenant resolution and authentication middleware:
//! - `tenant` - resolves the request host to a [`TenantScope`]
//! - `auth` - validates JWT bearer tokens for platform admins and tenant users
//!
//! [`TenantScope`]: crate::models::TenantScope

mod auth;
mod tenant;

pub use auth::{
    authenticate, require_platform_admin, require_principal, require_tenant_user, PlatformAdminUser, Principal,
    TenantContext, TenantUser,
};
pub use tenant::{resolve_tenant, TENANT_SLUG_HEADER};
