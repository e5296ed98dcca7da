use serde::{Deserialize, Serialize};

use crate::utils::unix_timestamp;

/// Role stamped into development tokens
pub const DEVELOPER_ROLE: &str = "developer";

/// Claims contained in a gateway token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user identity)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: u64,

    /// Expiration time (Unix timestamp)
    pub exp: u64,

    /// Caller role
    pub role: String,

    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Claims {
    /// Claims valid from now for `validity_secs`
    pub fn new(subject: impl Into<String>, role: impl Into<String>, validity_secs: u64) -> Self {
        let iat = unix_timestamp();
        Self {
            sub: subject.into(),
            iat,
            exp: iat.saturating_add(validity_secs),
            role: role.into(),
            iss: None,
        }
    }

    /// Set issuer
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.iss = Some(issuer.into());
        self
    }

    /// Expired at or after `exp`
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.exp
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_timestamp())
    }
}

/// Identity admitted by the auth gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub role: Option<String>,
}

/// Body returned by the development token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub success: bool,
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Body accepted by the development token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary() {
        let claims = Claims {
            sub: "alice".to_string(),
            iat: 100,
            exp: 200,
            role: DEVELOPER_ROLE.to_string(),
            iss: None,
        };

        assert!(!claims.is_expired_at(199));
        assert!(claims.is_expired_at(200));
        assert!(claims.is_expired_at(201));
    }

    #[test]
    fn test_new_claims_window() {
        let claims = Claims::new("alice", DEVELOPER_ROLE, 3600).with_issuer("ml-gateway");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.iss.as_deref(), Some("ml-gateway"));
        assert!(!claims.is_expired());
    }
}
