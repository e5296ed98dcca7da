use async_trait::async_trait;
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use sha2::Sha256;

use crate::config::{AuthConfig, AuthScheme};
use crate::core::request::GatewayRequest;
use crate::error::AuthError;
use crate::middleware::auth::models::{Claims, IssuedToken, Principal, DEVELOPER_ROLE};
use crate::middleware::auth::AuthService;

/// HS256 bearer token verification and development issuance
pub struct JwtAuthService {
    secret: Option<String>,
    issuer: String,
    token_expiration_seconds: u64,
}

impl JwtAuthService {
    /// Create a new JWT authentication service with the specified configuration
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone().filter(|s| !s.is_empty()),
            issuer: config.issuer.clone(),
            token_expiration_seconds: config.token_expiration,
        }
    }

    fn key(&self) -> Result<Hmac<Sha256>, AuthError> {
        let secret = self
            .secret
            .as_ref()
            .ok_or_else(|| AuthError::SigningUnavailable("No JWT secret configured".to_string()))?;

        Hmac::new_from_slice(secret.as_bytes())
            .map_err(|_| AuthError::SigningUnavailable("Failed to create key".to_string()))
    }

    /// Verify signature, expiry and issuer
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let key = self.key()?;

        let claims: Claims = token
            .verify_with_key(&key)
            .map_err(|_| AuthError::InvalidToken)?;

        if claims.is_expired() {
            return Err(AuthError::TokenExpired);
        }

        if let Some(iss) = &claims.iss {
            if iss != &self.issuer {
                return Err(AuthError::InvalidToken);
            }
        }

        Ok(claims)
    }

    /// Sign arbitrary claims
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        let key = self.key()?;
        claims
            .sign_with_key(&key)
            .map_err(|_| AuthError::SigningUnavailable("Failed to sign token".to_string()))
    }

    /// Mint a development token for any identity; performs no credential check
    pub fn issue_token(&self, subject: &str) -> Result<IssuedToken, AuthError> {
        let claims = Claims::new(subject, DEVELOPER_ROLE, self.token_expiration_seconds)
            .with_issuer(self.issuer.clone());

        Ok(IssuedToken {
            success: true,
            token: self.sign(&claims)?,
            token_type: "Bearer".to_string(),
            expires_in: self.token_expiration_seconds,
        })
    }
}

#[async_trait]
impl AuthService for JwtAuthService {
    async fn authorize(&self, request: &GatewayRequest) -> Result<Principal, AuthError> {
        let token = request.bearer_token().ok_or(AuthError::MissingCredentials)?;
        let claims = self.validate_token(&token)?;

        Ok(Principal {
            subject: claims.sub,
            role: Some(claims.role),
        })
    }

    fn scheme(&self) -> AuthScheme {
        AuthScheme::Jwt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str) -> JwtAuthService {
        JwtAuthService::new(&AuthConfig {
            jwt_secret: Some(secret.to_string()),
            ..AuthConfig::default()
        })
    }

    #[test]
    fn test_issue_and_validate() {
        let service = service("test-secret");
        let issued = service.issue_token("alice").unwrap();

        assert_eq!(issued.expires_in, 3600);
        assert_eq!(issued.token_type, "Bearer");

        let claims = service.validate_token(&issued.token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.role, DEVELOPER_ROLE);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_signature_is_rejected() {
        let issued = service("secret-a").issue_token("alice").unwrap();
        assert_eq!(
            service("secret-b").validate_token(&issued.token),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(
            service("secret-a").validate_token("not.a.token"),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = service("test-secret");
        let mut claims = Claims::new("alice", DEVELOPER_ROLE, 0);
        claims.iat -= 7200;
        claims.exp = claims.iat + 3600;
        let token = service.sign(&claims).unwrap();

        assert_eq!(service.validate_token(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_token_expiring_now_is_rejected() {
        let service = service("test-secret");
        let claims = Claims::new("alice", DEVELOPER_ROLE, 0);
        let token = service.sign(&claims).unwrap();

        assert_eq!(service.validate_token(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_foreign_issuer_is_rejected() {
        let service = service("test-secret");
        let claims = Claims::new("alice", DEVELOPER_ROLE, 60).with_issuer("someone-else");
        let token = service.sign(&claims).unwrap();

        assert_eq!(service.validate_token(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_missing_secret() {
        let service = JwtAuthService::new(&AuthConfig::default());
        assert!(matches!(
            service.issue_token("alice"),
            Err(AuthError::SigningUnavailable(_))
        ));
    }
}
