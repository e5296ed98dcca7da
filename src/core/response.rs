use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use hyper::{HeaderMap, StatusCode};
use serde::Serialize;

use crate::error::GatewayError;
use crate::models::BackendName;

/// Represents a response from the gateway
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// HTTP status code
    pub status: StatusCode,

    /// HTTP headers
    pub headers: HeaderMap,

    /// Response body
    pub body: Bytes,

    /// Backend that produced the response, for forwarded calls
    pub backend_name: Option<BackendName>,

    /// Time taken to process the request in milliseconds
    pub processing_time_ms: u64,
}

impl GatewayResponse {
    /// Create a new GatewayResponse
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            backend_name: None,
            processing_time_ms: 0,
        }
    }

    /// Create a JSON response
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Self, GatewayError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| GatewayError::InternalError(format!("Failed to encode response: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self::new(status, headers, Bytes::from(body)))
    }

    /// Create a new error response
    pub fn error(status: StatusCode, message: &str) -> Self {
        let body = serde_json::json!({
            "success": false,
            "message": message,
        });

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Self::new(status, headers, Bytes::from(body.to_string()))
    }

    /// Render a gateway error; raw transport details stay in the logs
    pub fn from_error(error: &GatewayError) -> Self {
        let status =
            StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match error {
            GatewayError::IoError(_) | GatewayError::ConfigError(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut response = Self::error(status, &message);
        if let Some(secs) = error.retry_after_secs() {
            response.headers.insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }

    /// Set backend name for this response
    pub fn with_backend_name(mut self, backend_name: BackendName) -> Self {
        self.backend_name = Some(backend_name);
        self
    }

    /// Set processing time for this response
    pub fn with_processing_time(mut self, processing_time_ms: u64) -> Self {
        self.processing_time_ms = processing_time_ms;
        self
    }

    /// Set a header, ignoring values that are not valid header text
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}
