//! # nsmuxd
//!
//! Standalone nsmux server: loads configuration, installs logging and
//! metrics, and serves a small chat-style hub until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nsmux_core::{ConnectionId, HubConfig, NamespaceHub};
use nsmux_server::config::ServerConfig;
use nsmux_server::server::NsmuxServer;
use serde_json::Value;

/// Multiplexed WebSocket pub/sub server.
#[derive(Parser, Debug)]
#[command(name = "nsmuxd", about = "Namespace-multiplexed WebSocket server")]
struct Cli {
    /// JSON config file (missing file means defaults).
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Host to bind (overrides config and env).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides config and env).
    #[arg(long)]
    port: Option<u16>,

    /// Log level when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Seconds to wait for sessions to drain on shutdown.
    #[arg(long, default_value = "10")]
    shutdown_timeout: u64,
}

impl Cli {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(level) = &self.log_level {
            config.log_level.clone_from(level);
        }
    }
}

/// Hub wiring for the bundled server.
///
/// - `/` relays the body to every other client as a bare frame
/// - `message` fans the body out to subscribers of `message`
fn demo_hub() -> HubConfig {
    HubConfig::new()
        .on("/", |conn: &ConnectionId, body: Value, hub: &NamespaceHub| {
            if let Err(e) = hub.broadcast_others(&body, conn) {
                tracing::warn!(error = %e, "relay failed");
            }
        })
        .on("message", |_: &ConnectionId, body: Value, hub: &NamespaceHub| {
            match hub.emit(&body, "message") {
                Ok(delivered) => tracing::debug!(delivered, "message fanned out"),
                Err(e) => tracing::warn!(error = %e, "emit failed"),
            }
        })
        .on_connect(|conn: &ConnectionId, _: Value, _: &NamespaceHub| {
            tracing::info!(conn_id = %conn, "joined");
        })
        .on_disconnect(|conn: &ConnectionId, _: Value, _: &NamespaceHub| {
            tracing::info!(conn_id = %conn, "left");
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = nsmux_server::loader::load_config(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    nsmux_server::logging::init_subscriber(&config.log_level);

    let mut server = NsmuxServer::new(config, demo_hub());
    match nsmux_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled"),
    }

    let (addr, handle) = server.listen().await.context("Failed to bind listener")?;
    tracing::info!(
        %addr,
        namespaces = ?server.hub().namespaces(),
        "nsmuxd ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let drained = server
        .shutdown_gracefully(vec![handle], Some(Duration::from_secs(cli.shutdown_timeout)))
        .await;
    if !drained {
        tracing::warn!("some sessions did not finish in time");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
