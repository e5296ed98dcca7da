use std::sync::Arc;
use std::time::Duration;

use hyper::{Method, StatusCode};
use serde_json::Value;

use crate::config::GatewayConfig;
use crate::core::request::GatewayRequest;
use crate::core::response::GatewayResponse;
use crate::error::GatewayError;
use crate::middleware::rate_limit::RateLimiter;
use crate::models::{
    AnalysisKind, AnalysisRequest, BackendFailure, BackendName, BackendOutcome, BackendRegistry,
    HealthSnapshot,
};
use crate::services::{BackendCaller, FanOutAggregator, HealthAggregator, HttpBackendClient};

/// Inbound path of the combined-analysis operation
pub const ANALYZE_ALL_PATH: &str = "/api/analyze/all";

/// Single-purpose operations, relayed to the same path on their backend
pub const FORWARD_ROUTES: [(&str, BackendName); 6] = [
    ("/api/face/register", BackendName::FaceRecognition),
    ("/api/face/verify", BackendName::FaceRecognition),
    ("/api/face/analyze", BackendName::FaceRecognition),
    ("/api/object-detection/idcard", BackendName::ObjectDetection),
    ("/api/object-detection/phone", BackendName::ObjectDetection),
    ("/api/sentiment/analyze", BackendName::SentimentAnalysis),
];

/// What a matched route does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Forward {
        backend: BackendName,
        upstream_path: &'static str,
    },
    AnalyzeAll,
}

#[derive(Debug, Clone)]
pub struct Route {
    pub path: &'static str,
    pub method: Method,
    pub target: RouteTarget,
}

/// Binds the auth-admitted request surface to the limiter, the backend
/// client and the two aggregators. Holds no per-request state.
pub struct GatewayRouter {
    routes: Vec<Route>,
    registry: Arc<BackendRegistry>,
    limiter: Arc<RateLimiter>,
    caller: Arc<dyn BackendCaller>,
    aggregator: FanOutAggregator,
    health: HealthAggregator,
}

impl GatewayRouter {
    pub fn new(config: &GatewayConfig, caller: Arc<dyn BackendCaller>) -> Self {
        let registry = Arc::new(BackendRegistry::from_config(config));
        let limiter = Arc::new(RateLimiter::from_registry(
            &registry,
            Duration::from_secs(config.rate_limit.window_seconds),
        ));
        let aggregator = FanOutAggregator::from_config(config, registry.clone(), caller.clone());
        let health = HealthAggregator::new(
            registry.clone(),
            caller.clone(),
            Duration::from_secs(config.aggregation.health_timeout_seconds),
        );

        let mut routes: Vec<Route> = FORWARD_ROUTES
            .iter()
            .map(|&(path, backend)| Route {
                path,
                method: Method::POST,
                target: RouteTarget::Forward {
                    backend,
                    upstream_path: path,
                },
            })
            .collect();
        routes.push(Route {
            path: ANALYZE_ALL_PATH,
            method: Method::POST,
            target: RouteTarget::AnalyzeAll,
        });

        Self {
            routes,
            registry,
            limiter,
            caller,
            aggregator,
            health,
        }
    }

    /// Router talking to backends over HTTP
    pub fn from_config(config: &GatewayConfig) -> Self {
        let connect_timeout = Duration::from_secs(config.aggregation.health_timeout_seconds.max(1));
        Self::new(config, Arc::new(HttpBackendClient::new(connect_timeout)))
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Match a method and path; a known path with another method is 405
    pub fn resolve(&self, method: &Method, path: &str) -> Result<&Route, GatewayError> {
        let mut path_known = false;
        for route in &self.routes {
            if route.path == path {
                if route.method == *method {
                    return Ok(route);
                }
                path_known = true;
            }
        }

        if path_known {
            Err(GatewayError::MethodNotAllowed(format!("{} {}", method, path)))
        } else {
            Err(GatewayError::RouteNotFound(path.to_string()))
        }
    }

    /// Aggregate backend liveness; never fails
    pub async fn health(&self) -> HealthSnapshot {
        self.health.check_all().await
    }

    pub async fn dispatch(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let route = self.resolve(&request.method, request.path())?;
        tracing::debug!(route = route.path, request_id = %request.request_id, "Route matched");

        match route.target {
            RouteTarget::Forward {
                backend,
                upstream_path,
            } => self.forward(backend, upstream_path, &request).await,
            RouteTarget::AnalyzeAll => self.analyze_all(&request).await,
        }
    }

    async fn forward(
        &self,
        backend_name: BackendName,
        upstream_path: &str,
        request: &GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let payload = match serde_json::from_slice::<Value>(&request.body) {
            Ok(value @ Value::Object(_)) => value,
            _ => {
                return Err(GatewayError::ValidationError(
                    "Request body must be a JSON object".to_string(),
                ))
            }
        };

        self.limiter.admit(backend_name).await?;

        let backend = self.registry.get(backend_name);
        let outcome = self
            .caller
            .call(backend, upstream_path, &payload, backend.timeout, &request.request_id)
            .await;

        relay(outcome).map(|response| response.with_backend_name(backend_name))
    }

    async fn analyze_all(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let analysis = AnalysisRequest::from_json(&request.body)?;
        let kinds = AnalysisKind::ALL;

        self.limiter
            .admit_all(&AnalysisKind::backends(&kinds))
            .await?;

        let result = self
            .aggregator
            .run(&analysis, &kinds, &request.request_id)
            .await;

        GatewayResponse::json(StatusCode::OK, &result)
    }
}

/// Relay a forwarded call: upstream JSON passes through with its status,
/// anything else becomes a gateway error naming the backend.
fn relay(outcome: BackendOutcome) -> Result<GatewayResponse, GatewayError> {
    let backend = outcome.backend;
    match outcome.result {
        Ok(body) => {
            let status = outcome
                .status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::OK);
            GatewayResponse::json(status, &body)
        }
        Err(BackendFailure::Status {
            status,
            body: Some(body),
        }) => {
            let status = StatusCode::from_u16(status).map_err(|_| GatewayError::BackendError {
                backend,
                detail: format!("invalid status {}", status),
            })?;
            GatewayResponse::json(status, &body)
        }
        Err(BackendFailure::Status { status, body: None }) => Err(GatewayError::BackendError {
            backend,
            detail: format!("HTTP {} without a JSON body", status),
        }),
        Err(BackendFailure::Malformed(detail)) => {
            Err(GatewayError::BackendError { backend, detail })
        }
        Err(failure) => {
            tracing::warn!(backend = %backend, error = %failure, "Backend unavailable");
            Err(GatewayError::BackendUnavailable(backend))
        }
    }
}
