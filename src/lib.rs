// ML Inference Gateway Library

pub mod config;
pub mod core;
pub mod error;
pub mod middleware;
pub mod mock_backend;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use error::{AuthError, ConfigError, GatewayError};
pub use models::{AnalysisKind, AnalysisRequest, Backend, BackendName, CombinedResult, HealthSnapshot};
pub use core::{
    gateway::{ApiGateway, Gateway},
    request::GatewayRequest,
    response::GatewayResponse,
    router::GatewayRouter,
};
pub use middleware::{Middleware, MiddlewareHandler};
