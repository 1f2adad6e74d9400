//! Configuration management for officegate.
//!
//! Loads configuration from environment variables (and `.env`) with support for:
//! - Multiple upstream services via the UPSTREAM_{NAME}_{FIELD} pattern
//! - Control-plane and per-tenant database locations
//! - JWT signing and the bootstrap platform administrator

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::env;
use std::sync::OnceLock;
use std::time::Duration;

use url::Url;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum JSON body accepted by local endpoints. Proxied bodies are
    /// streamed and not limited.
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Control-plane database (tenants, domains, platform admins).
    pub path: String,
    /// Directory holding one database file per tenant. `None` keeps tenant
    /// databases in memory, which only makes sense for tests.
    pub tenant_data_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Apex domain; tenants live at `<slug>.<root_domain>`.
    pub root_domain: String,
    /// Honour the `X-Tenant-Slug` header (local development only).
    pub allow_tenant_header: bool,
    pub tenant_cache_ttl: Duration,
    pub proxy_timeout: Duration,
    pub upstreams: BTreeMap<String, UpstreamConfig>,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub name: String,
    pub base_url: Url,
    /// Participates in global search fan-out.
    pub searchable: bool,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub token_ttl_secs: i64,
    /// bcrypt work factor for stored passwords.
    pub bcrypt_cost: u32,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub json: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_map(&vars)
    }

    /// Build configuration from an explicit variable map.
    pub fn from_map(vars: &HashMap<String, String>) -> Self {
        let get = |key: &str| vars.get(key).cloned();
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; tokens will not survive a restart");
            format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
        });

        let bootstrap_admin = match (get("PLATFORM_ADMIN_EMAIL"), get("PLATFORM_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            _ => None,
        };

        Self {
            server: ServerConfig {
                host: or("HOST", "0.0.0.0"),
                port: or("PORT", "8080").parse().unwrap_or(8080),
                max_body_bytes: or("MAX_BODY_BYTES", "2097152")
                    .parse()
                    .unwrap_or(2 * 1024 * 1024), // 2MB
            },
            database: DatabaseConfig {
                path: or("DATABASE_PATH", "./data/control.db"),
                tenant_data_dir: Some(or("TENANT_DATA_DIR", "./data/tenants")),
            },
            gateway: GatewayConfig {
                root_domain: or("ROOT_DOMAIN", "localhost").trim().trim_end_matches('.').to_lowercase(),
                allow_tenant_header: flag(get("GATEWAY_ALLOW_TENANT_HEADER"), false),
                tenant_cache_ttl: Duration::from_secs(
                    or("TENANT_CACHE_TTL_SECS", "60").parse().unwrap_or(60),
                ),
                proxy_timeout: Duration::from_secs(
                    or("PROXY_TIMEOUT_SECS", "30").parse().unwrap_or(30),
                ),
                upstreams: Self::parse_upstreams(vars),
            },
            auth: AuthConfig {
                jwt_secret,
                issuer: or("JWT_ISSUER", "officegate"),
                token_ttl_secs: or("JWT_TTL_SECS", "43200").parse().unwrap_or(43200), // 12h
                bcrypt_cost: or("BCRYPT_COST", "12").parse().unwrap_or(12),
                bootstrap_admin,
            },
            logging: LoggingConfig {
                json: or("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
            },
        }
    }

    /// Parse upstream services from environment variables.
    ///
    /// Pattern: UPSTREAM_{NAME}_{FIELD}
    /// Example:
    ///   UPSTREAM_PROJECTS_URL=http://projects:4002
    ///   UPSTREAM_PROJECTS_SEARCH=true
    ///   UPSTREAM_ASSESSMENTS_URL=http://assessments:4003
    ///
    /// Names are lowercased and underscores become hyphens, so
    /// `UPSTREAM_TIME_SHEETS_URL` is served at `/api/time-sheets/...`.
    fn parse_upstreams(vars: &HashMap<String, String>) -> BTreeMap<String, UpstreamConfig> {
        let mut upstreams = BTreeMap::new();
        let names: BTreeSet<String> = vars
            .keys()
            .filter_map(|key| key.strip_prefix("UPSTREAM_"))
            .filter_map(|rest| rest.strip_suffix("_URL"))
            .map(String::from)
            .collect();

        for raw in names {
            let name = raw.to_lowercase().replace('_', "-");
            if RESERVED_SERVICES.contains(&name.as_str()) {
                tracing::warn!(service = %name, "Upstream name is reserved for a local service; ignoring");
                continue;
            }

            let Some(url) = vars.get(&format!("UPSTREAM_{}_URL", raw)) else {
                continue;
            };

            let base_url = match Url::parse(url.trim()) {
                Ok(u) if u.scheme() == "http" || u.scheme() == "https" => u,
                _ => {
                    tracing::warn!(service = %name, url = %url, "Invalid upstream URL; ignoring");
                    continue;
                }
            };

            let searchable = flag(vars.get(&format!("UPSTREAM_{}_SEARCH", raw)).cloned(), false);

            upstreams.insert(
                name.clone(),
                UpstreamConfig {
                    name,
                    base_url,
                    searchable,
                },
            );
        }

        upstreams
    }
}

/// Path segments under `/api` served by the gateway itself.
const RESERVED_SERVICES: [&str; 3] = ["employees", "leave", "search"];

fn flag(value: Option<String>, default: bool) -> bool {
    match value {
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}
