//! Error types for officegate.
//!
//! Uses thiserror for ergonomic error definitions that integrate
//! with axum's response system.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Auth errors
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token was issued for a different tenant")]
    TenantMismatch,

    // Tenancy errors
    #[error("No tenant is registered for host {0}")]
    TenantNotFound(String),

    #[error("Tenant {0} is suspended")]
    TenantSuspended(String),

    #[error("This endpoint is only available on a tenant domain")]
    TenantRequired,

    #[error("This endpoint is only available on the platform domain")]
    PlatformRequired,

    // Resource errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cannot {action} a request that is {status}")]
    InvalidTransition { action: &'static str, status: String },

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request body exceeds the size limit")]
    PayloadTooLarge,

    #[error("Insufficient leave balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: f64, available: f64 },

    // Gateway errors
    #[error("Unknown service: {0}")]
    ServiceNotFound(String),

    #[error("Upstream {0} is unavailable")]
    UpstreamUnavailable(String),

    #[error("Upstream {0} timed out")]
    UpstreamTimeout(String),

    // External errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 401
            Self::Unauthenticated
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,

            // 403
            Self::Forbidden
            | Self::TenantMismatch
            | Self::TenantSuspended(_) => StatusCode::FORBIDDEN,

            // 404
            Self::NotFound(_)
            | Self::TenantNotFound(_)
            | Self::ServiceNotFound(_)
            | Self::TenantRequired
            | Self::PlatformRequired => StatusCode::NOT_FOUND,

            // 409
            Self::AlreadyExists(_) | Self::Conflict(_) | Self::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }

            // 400
            Self::Validation(_) | Self::InvalidInput(_) | Self::InsufficientBalance { .. } => {
                StatusCode::BAD_REQUEST
            }

            // 413
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,

            // 502
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,

            // 504
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,

            // 500
            Self::Database(_) | Self::Internal(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::TenantMismatch => "TENANT_MISMATCH",
            Self::TenantNotFound(_) => "TENANT_NOT_FOUND",
            Self::TenantSuspended(_) => "TENANT_SUSPENDED",
            Self::TenantRequired => "TENANT_REQUIRED",
            Self::PlatformRequired => "PLATFORM_REQUIRED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::ServiceNotFound(_) => "SERVICE_NOT_FOUND",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "UNKNOWN_ERROR",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Internal details stay in the logs
        let message = if status.is_server_error() && !matches!(self, Self::UpstreamUnavailable(_) | Self::UpstreamTimeout(_)) {
            tracing::error!(error = %self, code, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

// Convenience conversions
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::Validation(rejection.body_text())
        }
    }
}

impl From<bcrypt::BcryptError> for Error {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::Internal(format!("Password hashing failed: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            _ => Self::InvalidToken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::TenantMismatch.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::TenantNotFound("x.example.com".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::InvalidTransition { action: "approve", status: "rejected".into() }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::UpstreamUnavailable("projects".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::UpstreamTimeout("projects".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_payload_too_large() {
        assert_eq!(Error::PayloadTooLarge.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(Error::PayloadTooLarge.error_code(), "PAYLOAD_TOO_LARGE");
    }

    #[test]
    fn test_transition_message() {
        let err = Error::InvalidTransition { action: "approve", status: "cancelled".into() };
        assert_eq!(err.to_string(), "Cannot approve a request that is cancelled");
    }
}
