//! Service layer for officegate.
//!
//! Contains the gateway and leave business logic:
//! - Auth (JWT issuing/verification, bcrypt passwords)
//! - Tenancy (host to tenant resolution with a TTL cache)
//! - Tenants (tenant provisioning and domain management)
//! - Proxy (header-rewriting streaming reverse proxy)
//! - Search (fan-out across searchable upstreams)
//! - Calendar (working-day counting)
//! - Leave (requests, state machine, balances)

mod auth;
pub mod calendar;
pub mod leave;
pub mod proxy;
mod search;
mod tenancy;
mod tenants;

pub use auth::{AuthService, Claims, IssuedToken, PrincipalKind, MIN_PASSWORD_LEN};
pub use calendar::{LeaveCalendar, WorkWeek};
pub use leave::{LeaveActor, LeaveService};
pub use proxy::{ForwardContext, ProxyService};
pub use search::{SearchResponse, SearchService};
pub use tenancy::{normalize_host, DomainResolver};
pub use tenants::{NewDomain, NewTenant, ProvisionedTenant, TenantChanges, TenantDetail, TenantService};
