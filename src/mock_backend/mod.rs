//! Development stand-in for the inference backends.
//!
//! Serves the downstream contract the gateway consumes, with configurable
//! latency and random failures.

mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::BackendName;

/// Which backend to impersonate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MockKind {
    Face,
    Object,
    Sentiment,
}

impl MockKind {
    pub fn backend(&self) -> BackendName {
        match self {
            MockKind::Face => BackendName::FaceRecognition,
            MockKind::Object => BackendName::ObjectDetection,
            MockKind::Sentiment => BackendName::SentimentAnalysis,
        }
    }

    /// Conventional local port for this backend
    pub fn default_port(&self) -> u16 {
        match self {
            MockKind::Face => 5001,
            MockKind::Object => 5002,
            MockKind::Sentiment => 5003,
        }
    }
}

/// Configuration for the mock backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    pub kind: MockKind,

    /// Port to listen on
    pub port: u16,

    /// Probability of request failure (0.0 - 1.0)
    pub failure_rate: f64,

    /// Minimum delay in milliseconds
    pub min_delay_ms: u64,

    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
}

impl MockConfig {
    pub fn new(kind: MockKind) -> Self {
        Self {
            kind,
            port: kind.default_port(),
            failure_rate: 0.0,
            min_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

/// Build the mock backend's routes
pub fn app(config: MockConfig) -> Router {
    let router = Router::new().route("/health", get(routes::health_check));

    let router = match config.kind {
        MockKind::Face => router
            .route("/api/face/register", post(routes::face_register))
            .route("/api/face/verify", post(routes::face_verify))
            .route("/api/face/analyze", post(routes::face_analyze)),
        MockKind::Object => router
            .route("/api/object-detection/idcard", post(routes::detect_idcard))
            .route("/api/object-detection/phone", post(routes::detect_phone)),
        MockKind::Sentiment => router.route("/api/sentiment/analyze", post(routes::sentiment_analyze)),
    };

    router.layer(Extension(Arc::new(config)))
}

/// Serve the mock backend until the process ends
pub async fn run(config: MockConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!(
        kind = ?config.kind,
        failure_rate = config.failure_rate,
        min_delay_ms = config.min_delay_ms,
        max_delay_ms = config.max_delay_ms,
        "Mock {} backend listening on {}",
        config.kind.backend(),
        addr
    );

    axum::Server::try_bind(&addr)?
        .serve(app(config).into_make_service())
        .await?;

    Ok(())
}
