use tokio::signal;

use ml_gateway::config::{BasicConfigManager, ConfigManager};
use ml_gateway::middleware::logging::init_tracing;
use ml_gateway::{ApiGateway, Gateway, GatewayError};

/// Path of an optional TOML configuration file
const CONFIG_PATH_VAR: &str = "GATEWAY_CONFIG";

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    // .env is optional
    dotenvy::dotenv().ok();

    // Load configuration: defaults, then file, then environment
    let config_manager = BasicConfigManager::new();
    let config_path = std::env::var(CONFIG_PATH_VAR).ok();
    if let Some(path) = &config_path {
        config_manager.load_from_file(path).await?;
    }
    config_manager.apply_env_overrides().await?;
    let config = config_manager.get_config().await;

    init_tracing(&config.logging);
    if let Some(path) = &config_path {
        tracing::info!("Configuration loaded from {}", path);
    }

    let gateway = ApiGateway::from_config(config)?;

    tracing::info!(
        "Starting ML gateway on {}:{}",
        gateway.config().server.host,
        gateway.config().server.port
    );
    gateway.start().await?;

    // Wait for Ctrl+C
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
    }
    tracing::info!("Shutdown signal received, stopping ML gateway");

    gateway.stop().await?;
    tracing::info!("ML gateway stopped");

    Ok(())
}
