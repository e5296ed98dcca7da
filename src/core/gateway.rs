use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::future::BoxFuture;
use hyper::StatusCode;
use tokio::sync::{oneshot, Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::core::request::{GatewayRequest, REQUEST_ID_HEADER};
use crate::core::response::GatewayResponse;
use crate::core::router::GatewayRouter;
use crate::error::GatewayError;
use crate::middleware::auth::dev_token::{dev_token_routes, DEV_TOKEN_PATH};
use crate::middleware::auth::jwt::JwtAuthService;
use crate::middleware::auth::{self, AuthMiddleware};
use crate::middleware::logging::{log_error, LoggingMiddleware};
use crate::middleware::timing::TimingMiddleware;
use crate::middleware::{FinalHandler, Middleware, MiddlewareHandler, MiddlewareRegistry};

/// Core API Gateway trait that defines the main functionality
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Process an incoming request and return a response
    async fn process_request(
        &self,
        request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError>;

    /// Start the gateway server
    async fn start(&self) -> Result<(), GatewayError>;

    /// Stop the gateway server
    async fn stop(&self) -> Result<(), GatewayError>;

    /// True when every backend answers its liveness probe
    async fn health_check(&self) -> bool;
}

/// Server state that can be mutated
#[derive(Default)]
struct ServerState {
    /// Server handle for graceful shutdown
    server_handle: Option<tokio::task::JoinHandle<()>>,
    /// Shutdown signal sender
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Address actually bound, once started
    local_addr: Option<SocketAddr>,
}

/// The ML inference gateway: middleware chain in front of the router,
/// served over axum.
#[derive(Clone)]
pub struct ApiGateway {
    config: Arc<GatewayConfig>,
    router: Arc<GatewayRouter>,
    dev_tokens: Option<Arc<JwtAuthService>>,
    server_state: Arc<Mutex<ServerState>>,
    middleware_registry: Arc<RwLock<MiddlewareRegistry>>,
}

impl ApiGateway {
    /// Assemble a gateway around `router`. Installs logging, timing and,
    /// when enabled, authentication, in that order.
    pub fn new(config: GatewayConfig, router: GatewayRouter) -> Result<Self, GatewayError> {
        let mut registry = MiddlewareRegistry::new();
        let logging = if config.logging.detailed_requests {
            LoggingMiddleware::detailed()
        } else {
            LoggingMiddleware::basic()
        };
        registry.register(logging.with_redacted_header(&config.auth.api_key_header));
        registry.register(TimingMiddleware::new(config.server.slow_request_threshold_ms));

        match auth::from_config(&config.auth)? {
            Some(service) => {
                tracing::info!(scheme = ?service.scheme(), "Authentication enabled");
                registry.register(AuthMiddleware::new(service));
            }
            None => tracing::warn!("Authentication is disabled; all routes are open"),
        }

        let dev_tokens = if config.auth.dev_token_endpoint {
            tracing::warn!(
                path = DEV_TOKEN_PATH,
                "Development token endpoint enabled; it mints tokens without checking credentials"
            );
            Some(Arc::new(JwtAuthService::new(&config.auth)))
        } else {
            None
        };

        Ok(Self {
            config: Arc::new(config),
            router: Arc::new(router),
            dev_tokens,
            server_state: Arc::new(Mutex::new(ServerState::default())),
            middleware_registry: Arc::new(RwLock::new(registry)),
        })
    }

    /// Gateway talking to the configured backends over HTTP
    pub fn from_config(config: GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let router = GatewayRouter::from_config(&config);
        Self::new(config, router)
    }

    pub fn router(&self) -> &Arc<GatewayRouter> {
        &self.router
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Register a middleware with this gateway; it runs after those already registered
    pub async fn register_middleware<M>(&self, middleware: M)
    where
        M: Middleware + 'static,
    {
        let mut registry = self.middleware_registry.write().await;
        tracing::info!("Registered middleware: {}", middleware.name());
        registry.register(middleware);
    }

    /// Get all registered middlewares
    pub async fn get_middlewares(&self) -> Vec<Arc<dyn Middleware>> {
        self.middleware_registry.read().await.get_all()
    }

    async fn create_middleware_chain(&self) -> Arc<dyn MiddlewareHandler> {
        let router = Arc::clone(&self.router);
        let final_handler = FinalHandler::new(move |req: GatewayRequest| {
            let router = Arc::clone(&router);
            Box::pin(async move { router.dispatch(req).await })
                as BoxFuture<'static, Result<GatewayResponse, GatewayError>>
        });

        let registry = self.middleware_registry.read().await;
        registry.create_chain().build(Arc::new(final_handler))
    }

    /// Bound address of a running server
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.server_state.lock().await.local_addr
    }

    /// The full inbound surface as an axum router
    pub fn app(&self) -> axum::Router {
        let router = Arc::clone(&self.router);
        let gateway = Arc::new(self.clone());

        let mut app = axum::Router::new().route(
            "/health",
            get(move || {
                let router = Arc::clone(&router);
                async move {
                    let snapshot = router.health().await;
                    GatewayResponse::json(StatusCode::OK, &snapshot)
                        .unwrap_or_else(|e| GatewayResponse::from_error(&e))
                }
            }),
        );

        if let Some(service) = &self.dev_tokens {
            app = app.merge(dev_token_routes(Arc::clone(service)));
        }

        app.fallback(move |req: Request<Body>| {
            let gateway = Arc::clone(&gateway);
            async move { gateway.handle_http(req).await }
        })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
    }

    /// Convert an axum request, run it through the gateway and render the result
    async fn handle_http(&self, req: Request<Body>) -> Response {
        let (parts, body) = req.into_parts();
        let body_bytes = match hyper::body::to_bytes(body).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to read request body: {}", e);
                return GatewayResponse::error(StatusCode::BAD_REQUEST, "Failed to read request body")
                    .into_response();
            }
        };

        let client_ip = client_ip(&parts.headers, parts.extensions.get::<ConnectInfo<SocketAddr>>());
        let request = GatewayRequest::new(parts.method, parts.uri, parts.headers, body_bytes, client_ip);
        let request_id = request.request_id.clone();

        let timeout = Duration::from_secs(self.config.server.request_timeout);
        let result = match tokio::time::timeout(timeout, self.process_request(request)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::InternalError("request timed out".to_string())),
        };

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                if error.status_code() >= 500 {
                    log_error(&error, &request_id, "process_request");
                }
                GatewayResponse::from_error(&error)
            }
        };

        response
            .with_header(REQUEST_ID_HEADER, &request_id)
            .into_response()
    }
}

fn client_ip(
    headers: &hyper::HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip()))
}

#[async_trait]
impl Gateway for ApiGateway {
    async fn process_request(
        &self,
        request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let chain = self.create_middleware_chain().await;
        chain.handle(request).await
    }

    async fn start(&self) -> Result<(), GatewayError> {
        let mut server_state = self.server_state.lock().await;
        if server_state.server_handle.is_some() {
            return Err(GatewayError::InternalError(
                "Server is already running".to_string(),
            ));
        }

        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| GatewayError::InternalError(format!("Invalid address: {}", e)))?;

        let server = axum::Server::try_bind(&addr)
            .map_err(|e| GatewayError::InternalError(format!("Failed to bind {}: {}", addr, e)))?
            .serve(self.app().into_make_service_with_connect_info::<SocketAddr>());
        let local_addr = server.local_addr();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server_handle = tokio::spawn(async move {
            let graceful = server.with_graceful_shutdown(async {
                shutdown_rx.await.ok();
                tracing::info!("Shutdown signal received, starting graceful shutdown");
            });

            if let Err(e) = graceful.await {
                tracing::error!("Server error: {}", e);
            }

            tracing::info!("Server on {} has been shut down", local_addr);
        });

        server_state.server_handle = Some(server_handle);
        server_state.shutdown_tx = Some(shutdown_tx);
        server_state.local_addr = Some(local_addr);

        tracing::info!("ML gateway listening on {}", local_addr);
        Ok(())
    }

    async fn stop(&self) -> Result<(), GatewayError> {
        let mut server_state = self.server_state.lock().await;

        let handle = server_state.server_handle.take().ok_or_else(|| {
            GatewayError::InternalError("Server is not running".to_string())
        })?;

        if let Some(tx) = server_state.shutdown_tx.take() {
            let _ = tx.send(());
        }
        server_state.local_addr = None;

        handle.await.map_err(|e| {
            tracing::error!("Error while shutting down server: {}", e);
            GatewayError::InternalError(format!("Error while shutting down server: {}", e))
        })?;

        tracing::info!("Server has been shut down gracefully");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.router.health().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::services::testing::FakeCaller;
    use tower::ServiceExt;

    fn gateway(auth: AuthConfig) -> ApiGateway {
        let config = GatewayConfig {
            auth,
            ..GatewayConfig::default()
        };
        let router = GatewayRouter::new(&config, Arc::new(FakeCaller::new()));
        ApiGateway::new(config, router).unwrap()
    }

    #[tokio::test]
    async fn test_default_middlewares() {
        let gateway = gateway(AuthConfig {
            jwt_secret: Some("secret".to_string()),
            ..AuthConfig::default()
        });
        let names: Vec<String> = gateway
            .get_middlewares()
            .await
            .iter()
            .map(|m| m.name().to_string())
            .collect();

        assert_eq!(names, vec!["logging", "timing", "auth"]);
    }

    /// Counts requests that reach it, then passes them on
    struct Counting(Arc<std::sync::atomic::AtomicUsize>);

    #[async_trait]
    impl Middleware for Counting {
        async fn process_request(
            &self,
            request: GatewayRequest,
            next: Arc<dyn MiddlewareHandler>,
        ) -> Result<GatewayResponse, GatewayError> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            next.handle(request).await
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_registered_middleware_runs_after_defaults() {
        let gateway = gateway(AuthConfig {
            jwt_secret: Some("secret".to_string()),
            ..AuthConfig::default()
        });
        let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        gateway.register_middleware(Counting(hits.clone())).await;

        let names: Vec<String> = gateway
            .get_middlewares()
            .await
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names, vec!["logging", "timing", "auth", "counting"]);

        // Rejected by auth before reaching the registered middleware
        let response = gateway
            .app()
            .oneshot(Request::get("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 0);

        let token = JwtAuthService::new(&gateway.config().auth)
            .issue_token("alice")
            .unwrap()
            .token;
        let response = gateway
            .app()
            .oneshot(
                Request::get("/nowhere")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_auth_missing_secret_is_a_config_error() {
        let err = ApiGateway::new(
            GatewayConfig::default(),
            GatewayRouter::new(&GatewayConfig::default(), Arc::new(FakeCaller::new())),
        )
        .err()
        .unwrap();

        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_errors_are_json_and_echo_request_id() {
        let gateway = gateway(AuthConfig {
            enabled: false,
            dev_token_endpoint: false,
            ..AuthConfig::default()
        });

        let response = gateway
            .app()
            .oneshot(
                Request::get("/nowhere")
                    .header(REQUEST_ID_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc-123");
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let mut config = GatewayConfig::default();
        config.auth.enabled = false;
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        let router = GatewayRouter::new(&config, Arc::new(FakeCaller::new()));
        let gateway = ApiGateway::new(config, router).unwrap();

        gateway.start().await.unwrap();
        assert!(gateway.start().await.is_err());

        let addr = gateway.local_addr().await.unwrap();
        let body: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");

        gateway.stop().await.unwrap();
        assert!(gateway.stop().await.is_err());
    }
}
