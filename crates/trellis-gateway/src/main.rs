//! `trellisd` — the Trellis mesh-fleet coordinator daemon.
//!
//! Binds the BR WebSocket gateway, starts the liveness sweeper, and
//! runs until ctrl-c.

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trellis_core::Ipv6Prefix;
use trellis_gateway::{GatewayConfig, GatewayContext, GatewayServer};
use trellis_registry::spawn_sweeper;

/// Cloud-side coordinator for a fleet of Thread mesh networks.
#[derive(Debug, Parser)]
#[command(name = "trellisd", version, about)]
struct Args {
    /// Address the BR WebSocket listener binds.
    #[arg(long, env = "TRELLIS_LISTEN", default_value = trellis_gateway::config::DEFAULT_LISTEN)]
    listen: SocketAddr,

    /// Node inventory file (name ↔ ML-EID).
    #[arg(long, env = "TRELLIS_INVENTORY", default_value = "config/adresses.json")]
    inventory: PathBuf,

    /// Border Router credential file.
    #[arg(long, env = "TRELLIS_BORDER_ROUTERS", default_value = "config/border_routers.json")]
    border_routers: PathBuf,

    /// Heartbeat timeout in seconds.
    #[arg(long, env = "TRELLIS_HEARTBEAT_TIMEOUT", default_value_t = 30)]
    heartbeat_timeout: u64,

    /// CoAP reply timeout in seconds for direct probes.
    #[arg(long, env = "TRELLIS_COAP_TIMEOUT", default_value_t = 2)]
    coap_timeout: u64,

    /// Active-node window in seconds for the dynamic mapping.
    #[arg(long, env = "TRELLIS_ACTIVE_WINDOW", default_value_t = 60)]
    active_window: u64,

    /// Topology retention window in seconds.
    #[arg(long, env = "TRELLIS_RETENTION_WINDOW", default_value_t = 900)]
    retention_window: u64,

    /// Mesh-local prefix for ML-EID classification.
    #[arg(long, env = "TRELLIS_MESH_PREFIX", default_value = "fd00::/8")]
    mesh_prefix: Ipv6Prefix,
}

impl Args {
    fn into_config(self) -> GatewayConfig {
        GatewayConfig {
            listen: self.listen,
            inventory_path: self.inventory,
            credentials_path: self.border_routers,
            heartbeat_timeout: Duration::from_secs(self.heartbeat_timeout),
            coap_timeout: Duration::from_secs(self.coap_timeout),
            active_window: Duration::from_secs(self.active_window),
            retention_window: Duration::from_secs(self.retention_window),
            mesh_local_prefix: self.mesh_prefix,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,trellis_gateway=debug")),
        )
        .init();

    let args = Args::parse();
    let config = args.into_config();
    info!(listen = %config.listen, "Starting trellisd");

    let ctx = GatewayContext::init(config).context("failed to initialize coordinator state")?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let sweeper = spawn_sweeper(
        Arc::clone(&ctx.registry),
        Arc::clone(&ctx.topology),
        ctx.config.retention_window,
        shutdown_tx.subscribe(),
    );

    let server = GatewayServer::bind(Arc::clone(&ctx), shutdown_tx.subscribe())
        .await
        .context("failed to bind the BR gateway listener")?;
    let server_task = tokio::spawn(server.run());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutdown requested");

    let _ = shutdown_tx.send(());
    let _ = server_task.await;
    let _ = sweeper.await;
    Ok(())
}
