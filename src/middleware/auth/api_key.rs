use async_trait::async_trait;
use subtle::ConstantTimeEq;

use crate::config::{AuthConfig, AuthScheme};
use crate::core::request::GatewayRequest;
use crate::error::AuthError;
use crate::middleware::auth::models::Principal;
use crate::middleware::auth::AuthService;

/// Static shared-secret header check
pub struct ApiKeyAuthService {
    header: String,
    key: String,
}

impl ApiKeyAuthService {
    pub fn new(header: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            key: key.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.api_key_header.clone(),
            config.api_key.clone().unwrap_or_default(),
        )
    }
}

#[async_trait]
impl AuthService for ApiKeyAuthService {
    async fn authorize(&self, request: &GatewayRequest) -> Result<Principal, AuthError> {
        let provided = request
            .header(&self.header)
            .ok_or(AuthError::MissingCredentials)?;

        let matches: bool = provided.as_bytes().ct_eq(self.key.as_bytes()).into();
        if self.key.is_empty() || !matches {
            return Err(AuthError::InvalidToken);
        }

        Ok(Principal {
            subject: "api-key".to_string(),
            role: None,
        })
    }

    fn scheme(&self) -> AuthScheme {
        AuthScheme::ApiKey
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hyper::header::HeaderValue;
    use hyper::{HeaderMap, Method, Uri};

    fn request_with(header: Option<(&'static str, &'static str)>) -> GatewayRequest {
        let mut headers = HeaderMap::new();
        if let Some((name, value)) = header {
            headers.insert(name, HeaderValue::from_static(value));
        }
        GatewayRequest::new(
            Method::POST,
            Uri::from_static("/api/sentiment/analyze"),
            headers,
            Bytes::new(),
            None,
        )
    }

    #[tokio::test]
    async fn test_api_key_checks() {
        let service = ApiKeyAuthService::new("X-API-Key", "s3cret");

        assert!(service
            .authorize(&request_with(Some(("x-api-key", "s3cret"))))
            .await
            .is_ok());
        assert_eq!(
            service.authorize(&request_with(Some(("x-api-key", "s3cre7")))).await,
            Err(AuthError::InvalidToken)
        );
        assert_eq!(
            service.authorize(&request_with(None)).await,
            Err(AuthError::MissingCredentials)
        );
    }

    #[tokio::test]
    async fn test_key_comparison_rejects_prefix_and_extension() {
        let service = ApiKeyAuthService::new("X-API-Key", "abc");

        for candidate in ["ab", "abcd", "abd", ""] {
            let mut headers = HeaderMap::new();
            headers.insert("x-api-key", HeaderValue::from_str(candidate).unwrap());
            let request = GatewayRequest::new(
                Method::POST,
                Uri::from_static("/api/sentiment/analyze"),
                headers,
                Bytes::new(),
                None,
            );
            assert_eq!(
                service.authorize(&request).await,
                Err(AuthError::InvalidToken),
                "accepted {:?}",
                candidate
            );
        }
    }

    #[tokio::test]
    async fn test_empty_configured_key_rejects_everything() {
        let service = ApiKeyAuthService::new("X-API-Key", "");
        assert_eq!(
            service.authorize(&request_with(Some(("x-api-key", "")))).await,
            Err(AuthError::InvalidToken)
        );
    }
}
