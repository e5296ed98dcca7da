use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::ConfigError;
use crate::models::BackendName;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Inbound request timeout in seconds
    pub request_timeout: u64,

    /// Requests slower than this are logged as warnings
    pub slow_request_threshold_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: 30,
            slow_request_threshold_ms: 2000,
        }
    }
}

/// Credential scheme accepted by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// HS256 signed bearer tokens
    Jwt,
    /// Static shared secret in a request header
    ApiKey,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Whether authentication is enforced
    pub enabled: bool,

    pub scheme: AuthScheme,

    /// JWT signing secret
    pub jwt_secret: Option<String>,

    /// Shared secret for the api_key scheme
    pub api_key: Option<String>,

    /// Header carrying the shared secret
    pub api_key_header: String,

    /// Token expiration time in seconds
    pub token_expiration: u64,

    /// Issuer stamped into minted tokens
    pub issuer: String,

    /// Mount the development token endpoint
    pub dev_token_endpoint: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scheme: AuthScheme::Jwt,
            jwt_secret: None,
            api_key: None,
            api_key_header: "X-API-Key".to_string(),
            token_expiration: 3600,
            issuer: "ml-gateway".to_string(),
            dev_token_endpoint: true,
        }
    }
}

/// Fixed-window rate limiting applied per backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Admissions per window, unless a backend overrides it
    pub requests_per_window: u32,

    /// Window length in seconds
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 10,
            window_seconds: 60,
        }
    }
}

/// A single inference backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL
    pub url: String,

    /// Per-call timeout in seconds
    pub timeout_seconds: u64,

    /// Liveness path
    pub health_check_path: String,

    /// Overrides `rate_limit.requests_per_window` for this backend
    pub rate_limit: Option<u32>,
}

impl BackendConfig {
    fn with_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_seconds: 10,
            health_check_path: "/health".to_string(),
            rate_limit: None,
        }
    }
}

/// Backend addresses, one per logical backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub face_recognition: BackendConfig,
    pub object_detection: BackendConfig,
    pub sentiment_analysis: BackendConfig,
}

impl BackendsConfig {
    pub fn get(&self, name: BackendName) -> &BackendConfig {
        match name {
            BackendName::FaceRecognition => &self.face_recognition,
            BackendName::ObjectDetection => &self.object_detection,
            BackendName::SentimentAnalysis => &self.sentiment_analysis,
        }
    }

    pub fn get_mut(&mut self, name: BackendName) -> &mut BackendConfig {
        match name {
            BackendName::FaceRecognition => &mut self.face_recognition,
            BackendName::ObjectDetection => &mut self.object_detection,
            BackendName::SentimentAnalysis => &mut self.sentiment_analysis,
        }
    }
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            face_recognition: BackendConfig::with_url("http://localhost:5001"),
            object_detection: BackendConfig::with_url("http://localhost:5002"),
            sentiment_analysis: BackendConfig::with_url("http://localhost:5003"),
        }
    }
}

/// Fan-out and health probing limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Timeout for each call issued by the combined analysis
    pub call_timeout_seconds: u64,

    /// Ceiling for the whole combined analysis
    pub deadline_millis: u64,

    /// Timeout for each liveness probe
    pub health_timeout_seconds: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            call_timeout_seconds: 10,
            deadline_millis: 12_000,
            health_timeout_seconds: 2,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,

    /// Whether to log in JSON format
    pub json_format: bool,

    /// Log header names and sizes per request; credential values stay hidden
    pub detailed_requests: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            detailed_requests: false,
        }
    }
}

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub backends: BackendsConfig,
    pub aggregation: AggregationConfig,
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Overlay values from environment-style variables
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("GATEWAY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("GATEWAY_PORT") {
            self.server.port = parse_var("GATEWAY_PORT", &port)?;
        }

        for (name, key) in [
            (BackendName::FaceRecognition, "FACE_RECOGNITION_URL"),
            (BackendName::ObjectDetection, "OBJECT_DETECTION_URL"),
            (BackendName::SentimentAnalysis, "SENTIMENT_ANALYSIS_URL"),
        ] {
            if let Some(url) = var(key) {
                self.backends.get_mut(name).url = url;
            }
        }

        if let Some(secret) = var("JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(key) = var("GATEWAY_API_KEY") {
            self.auth.api_key = Some(key);
        }
        if let Some(scheme) = var("GATEWAY_AUTH_SCHEME") {
            self.auth.scheme = match scheme.as_str() {
                "jwt" => AuthScheme::Jwt,
                "api_key" => AuthScheme::ApiKey,
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "GATEWAY_AUTH_SCHEME must be jwt or api_key, got {}",
                        other
                    )))
                }
            };
        }

        if let Some(limit) = var("RATE_LIMIT_PER_WINDOW") {
            self.rate_limit.requests_per_window = parse_var("RATE_LIMIT_PER_WINDOW", &limit)?;
        }
        if let Some(window) = var("RATE_LIMIT_WINDOW_SECONDS") {
            self.rate_limit.window_seconds = parse_var("RATE_LIMIT_WINDOW_SECONDS", &window)?;
        }

        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = var("LOG_JSON") {
            self.logging.json_format = parse_var("LOG_JSON", &json)?;
        }
        if let Some(detailed) = var("LOG_DETAILED") {
            self.logging.detailed_requests = parse_var("LOG_DETAILED", &detailed)?;
        }

        Ok(())
    }

    /// Reject configurations the gateway cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.enabled {
            match self.auth.scheme {
                AuthScheme::Jwt if self.auth.jwt_secret.as_deref().unwrap_or("").is_empty() => {
                    return Err(ConfigError::ValidationError(
                        "auth.jwt_secret is required for the jwt scheme".to_string(),
                    ));
                }
                AuthScheme::ApiKey if self.auth.api_key.as_deref().unwrap_or("").is_empty() => {
                    return Err(ConfigError::ValidationError(
                        "auth.api_key is required for the api_key scheme".to_string(),
                    ));
                }
                _ => {}
            }
        }

        if self.rate_limit.requests_per_window == 0 || self.rate_limit.window_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit values must be positive".to_string(),
            ));
        }

        for name in BackendName::ALL {
            let backend = self.backends.get(name);
            if !(backend.url.starts_with("http://") || backend.url.starts_with("https://")) {
                return Err(ConfigError::ValidationError(format!(
                    "backends.{}.url must be an http(s) URL",
                    name
                )));
            }
            if backend.timeout_seconds == 0 || backend.rate_limit == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "backends.{} timeout and rate limit must be positive",
                    name
                )));
            }
        }

        let aggregation = &self.aggregation;
        if aggregation.call_timeout_seconds == 0 || aggregation.health_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "aggregation timeouts must be positive".to_string(),
            ));
        }
        if aggregation.deadline_millis < aggregation.call_timeout_seconds.saturating_mul(1000) {
            return Err(ConfigError::ValidationError(
                "aggregation.deadline_millis must not be shorter than call_timeout_seconds"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{} has an invalid value: {}", key, value)))
}

/// Configuration manager trait
#[async_trait]
pub trait ConfigManager: Send + Sync {
    /// Get the current configuration
    async fn get_config(&self) -> GatewayConfig;

    /// Load configuration from a TOML file
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<(), ConfigError>;

    /// Save configuration to a TOML file
    async fn save_to_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<(), ConfigError>;

    /// Replace the configuration
    async fn update_config(&self, config: GatewayConfig) -> Result<(), ConfigError>;

    /// Overlay process environment variables
    async fn apply_env_overrides(&self) -> Result<(), ConfigError>;
}

/// Basic implementation of the ConfigManager
pub struct BasicConfigManager {
    config: Arc<RwLock<GatewayConfig>>,
}

impl BasicConfigManager {
    /// Create a new BasicConfigManager with default configuration
    pub fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    pub fn with_config(config: GatewayConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }
}

impl Default for BasicConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigManager for BasicConfigManager {
    async fn get_config(&self) -> GatewayConfig {
        self.config.read().await.clone()
    }

    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        let config: GatewayConfig = toml::from_str(&contents)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        tracing::info!("Loaded configuration from {}", path.display());
        *self.config.write().await = config;
        Ok(())
    }

    async fn save_to_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(&*self.config.read().await)
            .map_err(|e| ConfigError::SaveError(e.to_string()))?;

        tokio::fs::write(path, contents)
            .await
            .map_err(|e| ConfigError::SaveError(e.to_string()))
    }

    async fn update_config(&self, config: GatewayConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let mut current_config = self.config.write().await;
        *current_config = config;
        Ok(())
    }

    async fn apply_env_overrides(&self) -> Result<(), ConfigError> {
        let mut config = self.config.write().await;
        config.apply_env(|key| std::env::var(key).ok())
    }
}
