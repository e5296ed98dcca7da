use clap::Parser;

use ml_gateway::config::LoggingConfig;
use ml_gateway::middleware::logging::init_tracing;
use ml_gateway::mock_backend::{self, MockConfig, MockKind};

/// Mock inference backend for local gateway development
#[derive(Debug, Parser)]
#[command(name = "mock_backend", version, about)]
struct Args {
    /// Backend to impersonate
    #[arg(long, value_enum)]
    kind: MockKind,

    /// Port to listen on (defaults to 5001/5002/5003 by kind)
    #[arg(long)]
    port: Option<u16>,

    /// Probability of a simulated 500 (0.0 - 1.0)
    #[arg(long, default_value_t = 0.0)]
    failure_rate: f64,

    #[arg(long, default_value_t = 0)]
    min_delay_ms: u64,

    #[arg(long, default_value_t = 0)]
    max_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(&LoggingConfig::default());

    if !(0.0..=1.0).contains(&args.failure_rate) {
        return Err("--failure-rate must be between 0.0 and 1.0".into());
    }

    let mut config = MockConfig::new(args.kind);
    if let Some(port) = args.port {
        config.port = port;
    }
    config.failure_rate = args.failure_rate;
    config.min_delay_ms = args.min_delay_ms;
    config.max_delay_ms = args.max_delay_ms;

    mock_backend::run(config).await
}
