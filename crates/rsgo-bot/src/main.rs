//! rsgo - ticker lifecycle engine entry point.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// READY/SET/GO ticker lifecycle engine
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via RSGO_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    rsgo_telemetry::init_logging()?;

    info!("Starting rsgo v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > RSGO_CONFIG > default
    let config_path = args
        .config
        .or_else(|| std::env::var("RSGO_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = rsgo_bot::AppConfig::load_or_default(&config_path)?;
    config.validate()?;
    info!(
        tickers = config.watchlist.len(),
        interval_ms = config.orchestrator.update_interval_ms,
        "Configuration loaded"
    );

    let app = rsgo_bot::Application::new(config, Some(PathBuf::from(config_path)))?;
    app.run().await?;

    Ok(())
}
