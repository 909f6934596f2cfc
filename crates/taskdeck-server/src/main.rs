use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use taskdeck_core::config::AppConfig;
use taskdeck_server::bootstrap;

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(about = "taskdeck - device task dashboard with live updates", long_about = None)]
struct Cli {
    /// Configuration file; defaults apply when it does not exist
    #[arg(short, long, default_value = "taskdeck.toml")]
    config: PathBuf,

    /// Listen address, overrides `server.bind`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    bootstrap::init_tracing(&config.log_level);
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    let services = bootstrap::start(&config);
    bootstrap::serve(listener, services, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
