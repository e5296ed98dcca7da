use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{Instrument, Level, Span};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;
use crate::core::request::GatewayRequest;
use crate::core::response::GatewayResponse;
use crate::error::GatewayError;
use crate::middleware::{Middleware, MiddlewareHandler};

/// Headers whose values never reach the logs, whatever the configuration
const REDACTED_HEADERS: [&str; 3] = ["authorization", "cookie", "x-api-key"];

/// Middleware for logging requests and responses with structured logging.
/// Bodies are never logged; they carry images and personal identifiers.
pub struct LoggingMiddleware {
    log_level: LogLevel,
    redacted: Vec<String>,
}

/// Log level for the logging middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Method, path, status and latency
    Basic,
    /// Also header names and sizes
    Detailed,
}

/// Initialize the tracing system. `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // A second initialization (tests, embedding) keeps the first subscriber.
    let result = if config.json_format {
        Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .json(),
            )
            .try_init()
    } else {
        Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339()),
            )
            .try_init()
    };

    if result.is_ok() {
        tracing::info!(
            level = %config.level,
            json = config.json_format,
            "Tracing system initialized"
        );
    }
}

impl LoggingMiddleware {
    pub fn new(log_level: LogLevel) -> Self {
        Self {
            log_level,
            redacted: REDACTED_HEADERS.iter().map(|h| h.to_string()).collect(),
        }
    }

    /// Also hide the value of `header`, e.g. a custom API key header
    pub fn with_redacted_header(mut self, header: &str) -> Self {
        let header = header.to_ascii_lowercase();
        if !self.redacted.contains(&header) {
            self.redacted.push(header);
        }
        self
    }

    fn is_redacted(&self, header: &str) -> bool {
        self.redacted.iter().any(|h| h.eq_ignore_ascii_case(header))
    }

    pub fn basic() -> Self {
        Self::new(LogLevel::Basic)
    }

    pub fn detailed() -> Self {
        Self::new(LogLevel::Detailed)
    }

    fn log_headers(&self, request: &GatewayRequest) {
        for (name, value) in request.headers.iter() {
            if self.is_redacted(name.as_str()) {
                tracing::debug!(header_name = %name, "Credential header present (value hidden)");
            } else {
                tracing::debug!(header_name = %name, header_value = ?value, "Request header");
            }
        }
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn process_request(
        &self,
        request: GatewayRequest,
        next: Arc<dyn MiddlewareHandler>,
    ) -> Result<GatewayResponse, GatewayError> {
        let request_span = tracing::span!(
            Level::INFO,
            "request",
            request_id = %request.request_id,
            method = %request.method,
            path = %request.uri.path(),
            client_ip = ?request.client_ip,
        );

        let method = request.method.clone();
        let path = request.uri.path().to_string();

        request_span.in_scope(|| {
            if self.log_level == LogLevel::Detailed {
                tracing::info!(
                    headers_count = request.headers.len(),
                    body_size = request.body.len(),
                    "Request received: {} {}",
                    method,
                    path
                );
                self.log_headers(&request);
            } else {
                tracing::info!("Request received: {} {}", method, path);
            }
        });

        let start = Instant::now();
        let result = next
            .handle(request)
            .instrument(request_span.clone())
            .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        request_span.in_scope(|| match &result {
            Ok(response) => {
                let status_code = response.status.as_u16();
                let backend = response.backend_name.map(|b| b.as_str());
                if status_code >= 400 {
                    tracing::warn!(status_code, elapsed_ms, backend, "Response: {} {}", method, path);
                } else {
                    tracing::info!(status_code, elapsed_ms, backend, "Response: {} {}", method, path);
                }
                if self.log_level == LogLevel::Detailed {
                    tracing::debug!(body_size = response.body.len(), "Response size");
                }
            }
            Err(error) => {
                let status_code = error.status_code();
                if status_code >= 500 {
                    tracing::error!(status_code, elapsed_ms, error = %error, "Request failed");
                } else {
                    tracing::warn!(status_code, elapsed_ms, error = %error, "Request rejected");
                }
            }
        });

        result
    }

    fn name(&self) -> &str {
        "logging"
    }
}

/// Create a span for a specific operation with common attributes
pub fn create_operation_span(operation: &str, request_id: &str) -> Span {
    tracing::span!(
        Level::INFO,
        "operation",
        operation = operation,
        request_id = request_id,
    )
}

/// Log an error with context information
pub fn log_error(error: &GatewayError, request_id: &str, context: &str) {
    tracing::error!(
        error_message = %error,
        status_code = error.status_code(),
        request_id = request_id,
        context = context,
        "Error occurred: {}",
        error
    );
}

/// Log a security event
pub fn log_security_event(event_type: &str, request_id: &str, details: &str, severity: &str) {
    tracing::warn!(
        event_type = event_type,
        request_id = request_id,
        details = details,
        severity = severity,
        "Security event: {}",
        event_type
    );
}
