pub mod auth;
pub mod logging;
pub mod rate_limit;
pub mod timing;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::core::request::GatewayRequest;
use crate::core::response::GatewayResponse;
use crate::error::GatewayError;

/// Middleware trait for processing requests and responses
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process a request before it reaches the router
    async fn process_request(
        &self,
        request: GatewayRequest,
        next: Arc<dyn MiddlewareHandler>,
    ) -> Result<GatewayResponse, GatewayError>;

    /// Get the name of this middleware
    fn name(&self) -> &str;
}

/// Handler for the next middleware in the chain
#[async_trait]
pub trait MiddlewareHandler: Send + Sync {
    /// Handle the request by passing it to the next middleware or the router
    async fn handle(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError>;
}

/// Chain of middleware handlers
#[derive(Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new middleware chain
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    fn add_shared(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    /// Build the middleware chain
    pub fn build(self, final_handler: Arc<dyn MiddlewareHandler>) -> Arc<dyn MiddlewareHandler> {
        let mut handler = final_handler;

        // Build the chain in reverse order
        for middleware in self.middlewares.into_iter().rev() {
            handler = Arc::new(MiddlewareLink {
                middleware,
                next: handler,
            });
        }

        handler
    }
}

/// Link in the middleware chain
struct MiddlewareLink {
    middleware: Arc<dyn Middleware>,
    next: Arc<dyn MiddlewareHandler>,
}

#[async_trait]
impl MiddlewareHandler for MiddlewareLink {
    async fn handle(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        self.middleware.process_request(request, self.next.clone()).await
    }
}

/// Ordered set of middlewares registered with the gateway
#[derive(Default)]
pub struct MiddlewareRegistry {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a middleware; it runs after those registered before it
    pub fn register<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    pub fn get_all(&self) -> Vec<Arc<dyn Middleware>> {
        self.middlewares.clone()
    }

    pub fn create_chain(&self) -> MiddlewareChain {
        let mut chain = MiddlewareChain::new();
        for middleware in &self.middlewares {
            chain.add_shared(middleware.clone());
        }
        chain
    }
}

/// Terminal handler wrapping a closure
pub struct FinalHandler<F> {
    handler: F,
}

impl<F> FinalHandler<F>
where
    F: Fn(GatewayRequest) -> BoxFuture<'static, Result<GatewayResponse, GatewayError>>
        + Send
        + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> MiddlewareHandler for FinalHandler<F>
where
    F: Fn(GatewayRequest) -> BoxFuture<'static, Result<GatewayResponse, GatewayError>>
        + Send
        + Sync,
{
    async fn handle(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        (self.handler)(request).await
    }
}
