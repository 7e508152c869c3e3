//! Gateway configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use trellis_core::Ipv6Prefix;

/// Default listen address for BR WebSocket sessions.
pub const DEFAULT_LISTEN: &str = "[::]:8765";

/// Everything the gateway needs at startup; assembled from CLI flags
/// and `TRELLIS_*` environment overrides by `trellisd`.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// TCP address the WebSocket listener binds.
    pub listen: SocketAddr,
    /// Path to the node inventory (`adresses.json`).
    pub inventory_path: PathBuf,
    /// Path to the BR credential file (`border_routers.json`).
    pub credentials_path: PathBuf,
    /// Heartbeat age after which a session counts as dead.
    pub heartbeat_timeout: Duration,
    /// Per-call CoAP reply timeout for direct probes.
    pub coap_timeout: Duration,
    /// Window inside which a dynamic-mapping entry is "active".
    pub active_window: Duration,
    /// Topology retention: nodes unseen this long are evicted.
    pub retention_window: Duration,
    /// Mesh-local prefix for ML-EID classification.
    pub mesh_local_prefix: Ipv6Prefix,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        #[allow(clippy::expect_used)]
        let listen = DEFAULT_LISTEN.parse().expect("default listen address is valid");
        #[allow(clippy::expect_used)]
        let mesh_local_prefix = "fd00::/8".parse().expect("default mesh prefix is valid");
        Self {
            listen,
            inventory_path: PathBuf::from("config/adresses.json"),
            credentials_path: PathBuf::from("config/border_routers.json"),
            heartbeat_timeout: Duration::from_secs(30),
            coap_timeout: Duration::from_secs(2),
            active_window: Duration::from_secs(60),
            retention_window: Duration::from_secs(900),
            mesh_local_prefix,
        }
    }
}
