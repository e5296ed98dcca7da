use std::sync::Arc;

use axum::{
    body::Bytes,
    response::{IntoResponse, Response},
    routing::post,
    Extension, Router,
};
use hyper::StatusCode;
use tracing::{error, info, warn};

use crate::core::response::GatewayResponse;
use crate::error::GatewayError;
use crate::middleware::auth::jwt::JwtAuthService;
use crate::middleware::auth::models::TokenRequest;

/// Path of the development token endpoint
pub const DEV_TOKEN_PATH: &str = "/api/auth/token";

/// Routes for minting development tokens. Any username/password pair is
/// accepted, empty strings included; only the keys must be present.
pub fn dev_token_routes(auth_service: Arc<JwtAuthService>) -> Router {
    Router::new()
        .route(DEV_TOKEN_PATH, post(issue_token))
        .layer(Extension(auth_service))
}

fn parse_credentials(body: &[u8]) -> Option<TokenRequest> {
    serde_json::from_slice(body).ok()
}

async fn issue_token(
    Extension(auth_service): Extension<Arc<JwtAuthService>>,
    body: Bytes,
) -> Response {
    let Some(credentials) = parse_credentials(&body) else {
        warn!("Token request without credentials");
        return GatewayResponse::error(StatusCode::BAD_REQUEST, "Missing credentials")
            .into_response();
    };

    let issued = match auth_service.issue_token(&credentials.username) {
        Ok(issued) => issued,
        Err(err) => {
            error!("Token issuance failed: {}", err);
            return GatewayResponse::from_error(&GatewayError::AuthError(err)).into_response();
        }
    };

    info!(subject = %credentials.username, "Issued development token");

    match GatewayResponse::json(StatusCode::OK, &issued) {
        Ok(response) => response.into_response(),
        Err(err) => GatewayResponse::from_error(&err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use hyper::Request;
    use tower::ServiceExt;

    use crate::config::AuthConfig;

    fn service() -> Arc<JwtAuthService> {
        Arc::new(JwtAuthService::new(&AuthConfig {
            jwt_secret: Some("test-secret".to_string()),
            ..AuthConfig::default()
        }))
    }

    async fn post_body(app: Router, body: &'static str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::post(DEV_TOKEN_PATH)
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_issues_verifiable_token() {
        let service = service();
        let (status, body) = post_body(
            dev_token_routes(service.clone()),
            r#"{"username":"alice","password":"anything"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["expires_in"], 3600);

        let claims = service
            .validate_token(body["token"].as_str().unwrap())
            .unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.role, "developer");
    }

    #[tokio::test]
    async fn test_empty_credentials_still_mint_a_token() {
        let service = service();
        let (status, body) =
            post_body(dev_token_routes(service.clone()), r#"{"username":"","password":""}"#).await;

        assert_eq!(status, StatusCode::OK);
        let claims = service
            .validate_token(body["token"].as_str().unwrap())
            .unwrap();
        assert_eq!(claims.sub, "");
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        for body in [r#"{"username":"alice"}"#, r#"{"password":"x"}"#, "{}", "not json", ""] {
            let (status, json) = post_body(dev_token_routes(service()), body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["message"], "Missing credentials");
        }
    }
}
