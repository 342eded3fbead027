//! The `spindle-agent` binary: load configuration, start the broker and
//! its adapter sources, run until interrupted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use agent_service::AgentBroker;
use spindle_config::load_config;

#[derive(Debug, Parser)]
#[command(name = "spindle-agent", about = "Industrial telemetry aggregation agent")]
struct Args {
    /// Path to the agent TOML configuration; defaults plus SPINDLE_*
    /// environment overrides apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    let broker = AgentBroker::new(config);
    let manager = broker
        .start_adapters()
        .await
        .context("Failed to start adapter sources")?;

    info!(instance_id = broker.instance_id(), "agent running");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("shutting down");
    broker.shutdown();
    manager.shutdown().await;
    Ok(())
}
