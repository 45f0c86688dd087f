//! # prana-gateway
//!
//! Prana realtime gateway binary — loads configuration, installs the
//! metrics recorder, and serves the WebSocket hub until ctrl-c.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use prana_server::metrics;
use prana_server::{PranaServer, ServerConfig};

/// Prana realtime gateway.
#[derive(Parser, Debug)]
#[command(name = "prana-gateway", about = "Prana realtime gateway")]
struct Cli {
    /// Host to bind (overrides PRANA_HOST).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides PRANA_PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Seconds between liveness probes (overrides PRANA_PROBE_INTERVAL_SECS).
    #[arg(long)]
    probe_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::from_env().context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(secs) = args.probe_interval {
        config.probe_interval_secs = secs;
    }

    let recorder = metrics::install_recorder();
    let server = PranaServer::new(config, recorder);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;

    tracing::info!("Prana gateway listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().shutdown();
    let _ = handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
