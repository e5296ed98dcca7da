use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::core::request::GatewayRequest;
use crate::core::response::GatewayResponse;
use crate::error::GatewayError;
use crate::middleware::{Middleware, MiddlewareHandler};

pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

/// Middleware for measuring request processing time
pub struct TimingMiddleware {
    /// Threshold in milliseconds for slow request logging
    slow_threshold_ms: u64,
}

impl TimingMiddleware {
    pub fn new(slow_threshold_ms: u64) -> Self {
        Self { slow_threshold_ms }
    }
}

impl Default for TimingMiddleware {
    fn default() -> Self {
        Self::new(2000)
    }
}

#[async_trait]
impl Middleware for TimingMiddleware {
    async fn process_request(
        &self,
        request: GatewayRequest,
        next: Arc<dyn MiddlewareHandler>,
    ) -> Result<GatewayResponse, GatewayError> {
        let method = request.method.clone();
        let path = request.uri.path().to_string();

        let start = Instant::now();
        let result = next.handle(request).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if elapsed_ms > self.slow_threshold_ms {
            tracing::warn!(
                elapsed_ms,
                threshold_ms = self.slow_threshold_ms,
                "Slow request: {} {}",
                method,
                path
            );
        } else {
            tracing::debug!(elapsed_ms, "Request timing: {} {}", method, path);
        }

        result.map(|response| {
            response
                .with_processing_time(elapsed_ms)
                .with_header(RESPONSE_TIME_HEADER, &format!("{}ms", elapsed_ms))
        })
    }

    fn name(&self) -> &str {
        "timing"
    }
}
