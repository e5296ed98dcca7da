// Models for the ML gateway

pub mod analysis;
pub mod health;
pub mod outcome;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;

pub use analysis::{AnalysisKind, AnalysisPayloads, AnalysisRequest, AnalysisSummary, CombinedResult, OutcomeReport};
pub use health::{HealthSnapshot, OverallStatus, ServiceStatus};
pub use outcome::{BackendFailure, BackendOutcome};

/// Logical identity of an inference backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendName {
    FaceRecognition,
    ObjectDetection,
    SentimentAnalysis,
}

impl BackendName {
    /// Every backend, in lock order
    pub const ALL: [BackendName; 3] = [
        BackendName::FaceRecognition,
        BackendName::ObjectDetection,
        BackendName::SentimentAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendName::FaceRecognition => "face_recognition",
            BackendName::ObjectDetection => "object_detection",
            BackendName::SentimentAnalysis => "sentiment_analysis",
        }
    }

    fn index(&self) -> usize {
        match self {
            BackendName::FaceRecognition => 0,
            BackendName::ObjectDetection => 1,
            BackendName::SentimentAnalysis => 2,
        }
    }
}

impl fmt::Display for BackendName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "face_recognition" | "face" => Ok(BackendName::FaceRecognition),
            "object_detection" | "object" => Ok(BackendName::ObjectDetection),
            "sentiment_analysis" | "sentiment" => Ok(BackendName::SentimentAnalysis),
            other => Err(format!("unknown backend: {}", other)),
        }
    }
}

/// Backend service definition
#[derive(Debug, Clone)]
pub struct Backend {
    /// Backend identity
    pub name: BackendName,

    /// Base URL without a trailing slash
    pub url: String,

    /// Per-call timeout for forwarded and fan-out requests
    pub timeout: Duration,

    /// Liveness probe path
    pub health_check_path: String,

    /// Admissions allowed per rate-limit window
    pub rate_limit: u32,
}

impl Backend {
    /// Absolute URL for a path served by this backend
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    pub fn health_url(&self) -> String {
        self.endpoint(&self.health_check_path)
    }
}

/// Immutable set holding exactly one backend per identity
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    backends: Vec<Backend>,
}

impl BackendRegistry {
    /// Build the registry from gateway configuration
    pub fn from_config(config: &GatewayConfig) -> Self {
        let backends = BackendName::ALL
            .iter()
            .map(|name| {
                let backend = config.backends.get(*name);
                Backend {
                    name: *name,
                    url: backend.url.trim_end_matches('/').to_string(),
                    timeout: Duration::from_secs(backend.timeout_seconds),
                    health_check_path: backend.health_check_path.clone(),
                    rate_limit: backend
                        .rate_limit
                        .unwrap_or(config.rate_limit.requests_per_window),
                }
            })
            .collect();

        Self { backends }
    }

    pub fn get(&self, name: BackendName) -> &Backend {
        &self.backends[name.index()]
    }

    pub fn all(&self) -> &[Backend] {
        &self.backends
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_name_round_trip() {
        for name in BackendName::ALL {
            assert_eq!(name.as_str().parse::<BackendName>().unwrap(), name);
        }
        assert!("vision".parse::<BackendName>().is_err());
        assert_eq!(
            serde_json::to_string(&BackendName::SentimentAnalysis).unwrap(),
            "\"sentiment_analysis\""
        );
    }

    #[test]
    fn test_registry_applies_overrides() {
        let mut config = GatewayConfig::default();
        config.backends.object_detection.url = "http://objects:5002/".to_string();
        config.backends.object_detection.rate_limit = Some(3);

        let registry = BackendRegistry::from_config(&config);

        let objects = registry.get(BackendName::ObjectDetection);
        assert_eq!(objects.url, "http://objects:5002");
        assert_eq!(objects.rate_limit, 3);
        assert_eq!(objects.health_url(), "http://objects:5002/health");

        let faces = registry.get(BackendName::FaceRecognition);
        assert_eq!(faces.rate_limit, 10);
        assert_eq!(faces.timeout, Duration::from_secs(10));
        assert_eq!(registry.all().len(), 3);
    }
}
