use std::path::PathBuf;

use clap::Parser;

use rpc_gateway::config::{load_config, validate_config, ConfigError, GatewayConfig, UpstreamMode};
use rpc_gateway::lifecycle::{self, signals, Shutdown};
use rpc_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "rpc-gateway")]
#[command(about = "HTTP/JSON gateway for unary RPC services", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upstream RPC endpoint (overrides `upstream.endpoint`).
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Serve the echo service in process instead of dialing an upstream.
    #[arg(long)]
    local: bool,

    /// Listen address (overrides `listener.bind_address`).
    #[arg(short, long)]
    bind: Option<String>,
}

fn load(cli: &Cli) -> Result<GatewayConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.upstream.endpoint = endpoint.clone();
        config.upstream.mode = UpstreamMode::Remote;
    }
    if cli.local {
        config.upstream.mode = UpstreamMode::Local;
    }
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    logging::init_logging(&config.observability)?;

    tracing::info!("rpc-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        mode = ?config.upstream.mode,
        endpoint = %config.upstream.endpoint,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    lifecycle::serve(config, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
