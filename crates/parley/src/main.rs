//! # parley
//!
//! WebRTC signaling relay binary. Binds the HTTP/WebSocket server and
//! runs until ctrl-c.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use parley_server::config::ServerConfig;
use parley_server::server::{AppState, listen};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// WebRTC signaling relay.
#[derive(Parser, Debug)]
#[command(name = "parley", about = "WebRTC signaling relay")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "8787")]
    port: u16,

    /// Maximum concurrent WebSocket connections.
    #[arg(long)]
    max_connections: Option<usize>,

    /// Heartbeat ping interval in seconds.
    #[arg(long)]
    heartbeat_interval: Option<u64>,

    /// Seconds of silence before a peer is considered dead.
    #[arg(long)]
    heartbeat_timeout: Option<u64>,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig {
            host: self.host,
            port: self.port,
            ..ServerConfig::default()
        };
        if let Some(max) = self.max_connections {
            config.max_connections = max;
        }
        if let Some(secs) = self.heartbeat_interval {
            config.heartbeat_interval_secs = secs;
        }
        if let Some(secs) = self.heartbeat_timeout {
            config.heartbeat_timeout_secs = secs;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_config();
    let state = AppState::new(config);
    let shutdown = Arc::clone(&state.shutdown);

    let handle = listen(state).await.context("Failed to bind server")?;
    tracing::info!("parley listening on http://{}", handle.addr);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    shutdown.shutdown();
    handle.finished().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
