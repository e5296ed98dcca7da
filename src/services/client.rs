use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::request::REQUEST_ID_HEADER;
use crate::models::{Backend, BackendFailure, BackendOutcome};

/// Outbound calls to inference backends.
///
/// Implementations never fail: every transport or protocol problem is
/// folded into the returned [`BackendOutcome`].
#[async_trait]
pub trait BackendCaller: Send + Sync {
    /// POST `payload` as JSON to `path` on `backend`
    async fn call(
        &self,
        backend: &Backend,
        path: &str,
        payload: &Value,
        timeout: Duration,
        request_id: &str,
    ) -> BackendOutcome;

    /// Liveness probe; true only for a 2xx answer within `timeout`
    async fn probe(&self, backend: &Backend, timeout: Duration) -> bool;
}

/// reqwest-backed [`BackendCaller`]
#[derive(Clone)]
pub struct HttpBackendClient {
    client: Client,
}

impl HttpBackendClient {
    pub fn new(connect_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to create HTTP client with custom settings, using default: {}", e);
                Client::new()
            });

        Self { client }
    }

    fn transport_failure(err: reqwest::Error, timeout: Duration) -> BackendFailure {
        if err.is_timeout() {
            BackendFailure::Timeout(timeout)
        } else if err.is_connect() {
            BackendFailure::Unreachable("connection failed".to_string())
        } else {
            BackendFailure::Unreachable(err.without_url().to_string())
        }
    }
}

impl Default for HttpBackendClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl BackendCaller for HttpBackendClient {
    async fn call(
        &self,
        backend: &Backend,
        path: &str,
        payload: &Value,
        timeout: Duration,
        request_id: &str,
    ) -> BackendOutcome {
        let start = Instant::now();
        let url = backend.endpoint(path);

        debug!(backend = %backend.name, %url, request_id, "Calling backend");

        let response = match self
            .client
            .post(&url)
            .header(REQUEST_ID_HEADER, request_id)
            .json(payload)
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let failure = Self::transport_failure(err, timeout);
                warn!(backend = %backend.name, request_id, error = %failure, "Backend call failed");
                return BackendOutcome::failure(backend.name, failure, start.elapsed());
            }
        };

        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                let failure = Self::transport_failure(err, timeout);
                warn!(backend = %backend.name, request_id, error = %failure, "Backend body read failed");
                return BackendOutcome::failure(backend.name, failure, start.elapsed());
            }
        };
        let latency = start.elapsed();
        let body = serde_json::from_slice::<Value>(&bytes).ok();

        debug!(
            backend = %backend.name,
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            "Backend responded"
        );

        match body {
            Some(body) if status.is_success() => {
                BackendOutcome::success(backend.name, status.as_u16(), body, latency)
            }
            None if status.is_success() => BackendOutcome::failure(
                backend.name,
                BackendFailure::Malformed("response body is not JSON".to_string()),
                latency,
            ),
            body => BackendOutcome::failure(
                backend.name,
                BackendFailure::Status {
                    status: status.as_u16(),
                    body,
                },
                latency,
            ),
        }
    }

    async fn probe(&self, backend: &Backend, timeout: Duration) -> bool {
        match self
            .client
            .get(backend.health_url())
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(backend = %backend.name, status = %response.status(), "Health check failed");
                false
            }
            Err(err) => {
                warn!(backend = %backend.name, error = %err.without_url(), "Health check error");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::models::BackendName;

    fn backend(url: String) -> Backend {
        Backend {
            name: BackendName::FaceRecognition,
            url,
            timeout: Duration::from_secs(1),
            health_check_path: "/health".to_string(),
            rate_limit: 10,
        }
    }

    #[tokio::test]
    async fn test_successful_call_forwards_request_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/face/verify"))
            .and(header("x-request-id", "req-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "verified": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = HttpBackendClient::default()
            .call(
                &backend(server.uri()),
                "/api/face/verify",
                &json!({"image": "aGVsbG8="}),
                Duration::from_secs(1),
                "req-1",
            )
            .await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.body().unwrap()["verified"], true);
    }

    #[tokio::test]
    async fn test_error_status_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"success": false, "message": "No matching face found"})),
            )
            .mount(&server)
            .await;

        let outcome = HttpBackendClient::default()
            .call(&backend(server.uri()), "/api/face/verify", &json!({}), Duration::from_secs(1), "r")
            .await;

        assert_eq!(outcome.status, Some(404));
        assert_eq!(outcome.body().unwrap()["message"], "No matching face found");
        assert!(matches!(outcome.result, Err(BackendFailure::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_non_json_success_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let outcome = HttpBackendClient::default()
            .call(&backend(server.uri()), "/x", &json!({}), Duration::from_secs(1), "r")
            .await;

        assert!(matches!(outcome.result, Err(BackendFailure::Malformed(_))));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let outcome = HttpBackendClient::default()
            .call(&backend(server.uri()), "/x", &json!({}), Duration::from_millis(100), "r")
            .await;

        assert_eq!(
            outcome.result.unwrap_err(),
            BackendFailure::Timeout(Duration::from_millis(100))
        );
        assert_eq!(outcome.status, None);
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let outcome = HttpBackendClient::default()
            .call(
                &backend("http://127.0.0.1:1".to_string()),
                "/x",
                &json!({}),
                Duration::from_secs(1),
                "r",
            )
            .await;

        assert!(matches!(
            outcome.result,
            Err(BackendFailure::Unreachable(_)) | Err(BackendFailure::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_liveness_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = HttpBackendClient::default();
        assert!(client.probe(&backend(server.uri()), Duration::from_secs(1)).await);

        let mut broken = backend(server.uri());
        broken.health_check_path = "/missing".to_string();
        assert!(!client.probe(&broken, Duration::from_secs(1)).await);
    }
}
