use std::net::IpAddr;
use std::time::SystemTime;

use bytes::Bytes;
use hyper::{HeaderMap, Method, Uri};

use crate::utils::generate_id;

/// Header used to correlate a request across the gateway and its backends
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Represents a request to the gateway
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// HTTP method
    pub method: Method,

    /// Request URI
    pub uri: Uri,

    /// HTTP headers
    pub headers: HeaderMap,

    /// Request body
    pub body: Bytes,

    /// Client IP address
    pub client_ip: Option<IpAddr>,

    /// Request timestamp
    pub timestamp: SystemTime,

    /// Request ID for tracing
    pub request_id: String,
}

impl GatewayRequest {
    /// Create a new GatewayRequest, keeping a caller supplied request ID if present
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
        client_ip: Option<IpAddr>,
    ) -> Self {
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty() && v.len() <= 128)
            .map(str::to_string)
            .unwrap_or_else(generate_id);

        Self {
            method,
            uri,
            headers,
            body,
            client_ip,
            timestamp: SystemTime::now(),
            request_id,
        }
    }

    /// Get a header value as a string
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    /// Token from an `Authorization: Bearer <token>` header
    pub fn bearer_token(&self) -> Option<String> {
        self.header("authorization").and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        })
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }
}
