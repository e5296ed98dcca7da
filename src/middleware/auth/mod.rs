pub mod api_key;
pub mod dev_token;
pub mod jwt;
pub mod models;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{AuthConfig, AuthScheme};
use crate::core::request::GatewayRequest;
use crate::core::response::GatewayResponse;
use crate::error::{AuthError, ConfigError, GatewayError};
use crate::middleware::auth::api_key::ApiKeyAuthService;
use crate::middleware::auth::jwt::JwtAuthService;
use crate::middleware::auth::models::Principal;
use crate::middleware::logging::log_security_event;
use crate::middleware::{Middleware, MiddlewareHandler};

/// Authentication service interface
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Decide whether the caller may proceed
    async fn authorize(&self, request: &GatewayRequest) -> Result<Principal, AuthError>;

    /// Credential scheme this service checks
    fn scheme(&self) -> AuthScheme;
}

/// Build the configured auth service, or `None` when authentication is disabled
pub fn from_config(config: &AuthConfig) -> Result<Option<Arc<dyn AuthService>>, ConfigError> {
    if !config.enabled {
        return Ok(None);
    }

    let service: Arc<dyn AuthService> = match config.scheme {
        AuthScheme::Jwt => {
            if config.jwt_secret.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::ValidationError(
                    "auth.jwt_secret is required for the jwt scheme".to_string(),
                ));
            }
            Arc::new(JwtAuthService::new(config))
        }
        AuthScheme::ApiKey => {
            if config.api_key.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::ValidationError(
                    "auth.api_key is required for the api_key scheme".to_string(),
                ));
            }
            Arc::new(ApiKeyAuthService::from_config(config))
        }
    };

    Ok(Some(service))
}

/// Rejects unauthenticated requests before any quota or backend work happens
pub struct AuthMiddleware {
    auth_service: Arc<dyn AuthService>,
}

impl AuthMiddleware {
    /// Create a new AuthMiddleware with the specified authentication service
    pub fn new(auth_service: Arc<dyn AuthService>) -> Self {
        Self { auth_service }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn process_request(
        &self,
        request: GatewayRequest,
        next: Arc<dyn MiddlewareHandler>,
    ) -> Result<GatewayResponse, GatewayError> {
        match self.auth_service.authorize(&request).await {
            Ok(principal) => {
                tracing::debug!(
                    request_id = %request.request_id,
                    subject = %principal.subject,
                    "Authentication successful"
                );
                next.handle(request).await
            }
            Err(err) => {
                let event = match err {
                    AuthError::MissingCredentials => "auth_missing",
                    AuthError::TokenExpired => "auth_expired",
                    AuthError::InvalidToken => "auth_invalid",
                    AuthError::SigningUnavailable(_) => "auth_unavailable",
                };
                log_security_event(event, &request.request_id, request.path(), "medium");
                Err(GatewayError::AuthError(err))
            }
        }
    }

    fn name(&self) -> &str {
        "auth"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::future::BoxFuture;
    use hyper::header::{HeaderValue, AUTHORIZATION};
    use hyper::{HeaderMap, Method, StatusCode, Uri};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::middleware::FinalHandler;

    fn jwt_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: Some("test-secret".to_string()),
            ..AuthConfig::default()
        }
    }

    fn counting_handler(hits: Arc<AtomicUsize>) -> Arc<dyn MiddlewareHandler> {
        Arc::new(FinalHandler::new(move |_req| {
            hits.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Ok(GatewayResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::new()))
            }) as BoxFuture<'static, _>
        }))
    }

    fn request(authorization: Option<&str>) -> GatewayRequest {
        let mut headers = HeaderMap::new();
        if let Some(value) = authorization {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        GatewayRequest::new(
            Method::POST,
            Uri::from_static("/api/face/verify"),
            headers,
            Bytes::new(),
            None,
        )
    }

    #[tokio::test]
    async fn test_missing_token_short_circuits() {
        let hits = Arc::new(AtomicUsize::new(0));
        let service = from_config(&jwt_config()).unwrap().unwrap();
        let middleware = AuthMiddleware::new(service);

        let err = middleware
            .process_request(request(None), counting_handler(hits.clone()))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 401);
        assert_eq!(err.to_string(), "Token is missing");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_token_short_circuits() {
        let hits = Arc::new(AtomicUsize::new(0));
        let middleware = AuthMiddleware::new(from_config(&jwt_config()).unwrap().unwrap());

        let err = middleware
            .process_request(request(Some("Bearer garbage")), counting_handler(hits.clone()))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid or expired token");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_token_passes_through() {
        let hits = Arc::new(AtomicUsize::new(0));
        let config = jwt_config();
        let token = JwtAuthService::new(&config).issue_token("alice").unwrap().token;
        let middleware = AuthMiddleware::new(from_config(&config).unwrap().unwrap());

        let response = middleware
            .process_request(
                request(Some(&format!("Bearer {}", token))),
                counting_handler(hits.clone()),
            )
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config() {
        let disabled = AuthConfig {
            enabled: false,
            ..AuthConfig::default()
        };
        assert!(from_config(&disabled).unwrap().is_none());

        assert!(from_config(&AuthConfig::default()).is_err());

        let api_key = AuthConfig {
            scheme: AuthScheme::ApiKey,
            api_key: Some("k".to_string()),
            ..AuthConfig::default()
        };
        assert_eq!(
            from_config(&api_key).unwrap().unwrap().scheme(),
            AuthScheme::ApiKey
        );
    }
}
