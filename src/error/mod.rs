use std::time::Duration;

use thiserror::Error;

use crate::models::BackendName;

/// Gateway error types
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Rate limit exceeded for {backend} service")]
    RateLimited {
        backend: BackendName,
        retry_after: Duration,
    },

    #[error("{0} service unavailable")]
    BackendUnavailable(BackendName),

    #[error("{backend} service returned an invalid response: {detail}")]
    BackendError { backend: BackendName, detail: String },

    #[error("{0}")]
    ValidationError(String),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("{0}")]
    AuthError(#[from] AuthError),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// HTTP status code mapping for gateway errors
impl GatewayError {
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::RateLimited { .. } => 429,
            GatewayError::BackendUnavailable(_) => 503,
            GatewayError::BackendError { .. } => 502,
            GatewayError::ValidationError(_) => 400,
            GatewayError::RouteNotFound(_) => 404,
            GatewayError::MethodNotAllowed(_) => 405,
            GatewayError::ConfigError(_) => 500,
            GatewayError::AuthError(AuthError::SigningUnavailable(_)) => 500,
            GatewayError::AuthError(_) => 401,
            GatewayError::InternalError(_) => 500,
            GatewayError::IoError(_) => 500,
        }
    }

    /// Seconds a throttled caller should wait, rounded up
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            GatewayError::RateLimited { retry_after, .. } => {
                let secs = retry_after.as_secs();
                Some(if retry_after.subsec_nanos() > 0 { secs + 1 } else { secs })
            }
            _ => None,
        }
    }
}

/// Authentication specific errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Token is missing")]
    MissingCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid or expired token")]
    TokenExpired,

    #[error("Token signing unavailable: {0}")]
    SigningUnavailable(String),
}

/// Configuration specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),
}
