//! Authentication service.
//!
//! Issues and verifies JWTs for the two principal kinds and checks bcrypt
//! password hashes:
//! - platform administrators, stored in the control-plane database
//! - tenant users (employees), stored in each tenant database
//!
//! A token records which kind of principal it was issued to and, for tenant
//! users, the tenant that issued it. The middleware refuses tokens presented
//! on the wrong scope.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::db::{self, DbPool, Employee, PlatformAdmin};
use crate::error::{Error, Result};
use crate::models::{new_id, ResolvedTenant};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Which kind of principal a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    PlatformAdmin,
    TenantUser,
}

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub kind: PrincipalKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub role: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// A freshly signed token.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Service for password and token handling.
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        Self {
            config,
            encoding,
            decoding,
        }
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    pub fn issue_platform_token(&self, admin: &PlatformAdmin) -> Result<IssuedToken> {
        self.sign(
            admin.id.clone(),
            PrincipalKind::PlatformAdmin,
            None,
            "platform_admin".to_string(),
            admin.email.clone(),
        )
    }

    pub fn issue_tenant_token(&self, employee: &Employee, tenant: &ResolvedTenant) -> Result<IssuedToken> {
        self.sign(
            employee.id.clone(),
            PrincipalKind::TenantUser,
            Some(tenant.id.clone()),
            employee.role.clone(),
            employee.email.clone(),
        )
    }

    fn sign(
        &self,
        sub: String,
        kind: PrincipalKind,
        tenant_id: Option<String>,
        role: String,
        email: String,
    ) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.token_ttl_secs);

        let claims = Claims {
            sub,
            kind,
            tenant_id,
            role,
            email,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))?;

        Ok(IssuedToken {
            token,
            token_type: "Bearer",
            expires_at: Utc.timestamp_opt(claims.exp, 0).single().unwrap_or(expires_at),
        })
    }

    /// Verify signature, issuer and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.leeway = 30;

        let data = decode::<Claims>(token, &self.decoding, &validation)?;

        // Tenant tokens must name their tenant
        if data.claims.kind == PrincipalKind::TenantUser && data.claims.tenant_id.is_none() {
            return Err(Error::InvalidToken);
        }

        Ok(data.claims)
    }

    // ========================================================================
    // Passwords
    // ========================================================================

    /// Hash a password on the blocking pool.
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let password = password.to_string();
        let cost = self.config.bcrypt_cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| Error::Internal(format!("Hashing task failed: {}", e)))??;
        Ok(hash)
    }

    /// Verify a password on the blocking pool. Malformed hashes never match.
    pub async fn verify_password(&self, password: &str, hash: &str) -> bool {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
            .await
            .unwrap_or(false)
    }

    // ========================================================================
    // Logins
    // ========================================================================

    pub async fn login_platform_admin(
        &self,
        db: &DbPool,
        email: &str,
        password: &str,
    ) -> Result<(PlatformAdmin, IssuedToken)> {
        let admin = db::get_platform_admin_by_email(db, email.trim()).await?;

        let Some(admin) = admin else {
            // Burn comparable time so unknown emails are not distinguishable
            let _ = self.verify_password(password, DUMMY_HASH).await;
            return Err(Error::InvalidCredentials);
        };

        if !self.verify_password(password, &admin.password_hash).await {
            warn!(admin_id = %admin.id, "Platform admin login failed");
            return Err(Error::InvalidCredentials);
        }

        db::record_admin_login(db, &admin.id).await?;
        let token = self.issue_platform_token(&admin)?;
        info!(admin_id = %admin.id, "Platform admin signed in");
        Ok((admin, token))
    }

    pub async fn login_tenant_user(
        &self,
        pool: &DbPool,
        tenant: &ResolvedTenant,
        email: &str,
        password: &str,
    ) -> Result<(Employee, IssuedToken)> {
        let employee = db::get_employee_by_email(pool, email.trim()).await?;

        let Some(employee) = employee.filter(|e| e.can_sign_in()) else {
            let _ = self.verify_password(password, DUMMY_HASH).await;
            return Err(Error::InvalidCredentials);
        };

        if !self.verify_password(password, &employee.password_hash).await {
            warn!(tenant = %tenant.slug, employee_id = %employee.id, "Tenant login failed");
            return Err(Error::InvalidCredentials);
        }

        let token = self.issue_tenant_token(&employee, tenant)?;
        info!(tenant = %tenant.slug, employee_id = %employee.id, "Tenant user signed in");
        Ok((employee, token))
    }

    /// Create the configured platform administrator when none exists yet.
    pub async fn bootstrap_platform_admin(&self, db: &DbPool) -> Result<Option<PlatformAdmin>> {
        let Some(bootstrap) = self.config.bootstrap_admin.clone() else {
            return Ok(None);
        };

        if db::count_platform_admins(db).await? > 0 {
            return Ok(None);
        }

        let password_hash = self.hash_password(&bootstrap.password).await?;
        let admin = db::create_platform_admin(
            db,
            db::CreatePlatformAdmin {
                id: new_id(),
                email: bootstrap.email,
                display_name: Some("Platform Admin".to_string()),
                password_hash,
            },
        )
        .await?;

        info!(email = %admin.email, "Bootstrapped platform administrator");
        Ok(Some(admin))
    }
}

/// bcrypt hash of a random string, used to equalize login timing.
const DUMMY_HASH: &str = "$2b$12$C6UzMDM.H6dfI/f/IKcEeO5CpkUCkVv0ZuSOoFmyQxhIsTjN0QmAm";
