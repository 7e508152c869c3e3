//! The wired-together application context.
//!
//! All collaborators are injected here once, at startup. Handlers take
//! `&GatewayContext`; nothing reaches for globals.

use std::sync::Arc;

use dashmap::DashMap;
use trellis_coap::CoapClient;
use trellis_config::{BrCredentials, NodeInventory};
use trellis_events::EventBus;
use trellis_registry::{BrRegistry, NodeAddressMap};
use trellis_topology::TopologyAggregator;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::resolver::NameResolver;
use crate::session::BrConnection;

/// Shared state for every session task and handler.
pub struct GatewayContext {
    /// Startup configuration.
    pub config: GatewayConfig,
    /// BR session registry.
    pub registry: Arc<BrRegistry>,
    /// Topology aggregator.
    pub topology: Arc<TopologyAggregator>,
    /// Node inventory (name ↔ ML-EID).
    pub inventory: Arc<NodeInventory>,
    /// BR credential store.
    pub credentials: Arc<BrCredentials>,
    /// Dynamic IPv6 mapping.
    pub mapping: Arc<NodeAddressMap>,
    /// Layered name resolution.
    pub resolver: NameResolver,
    /// Event fan-out bus.
    pub bus: EventBus,
    /// One-shot CoAP client for direct probes.
    pub coap: CoapClient,
    /// Live connections: BR id → session handle + outbound queue.
    pub connections: DashMap<String, BrConnection>,
}

impl GatewayContext {
    /// Wire up all collaborators from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the credential file exists
    /// but cannot be parsed (fatal on first load).
    pub fn init(config: GatewayConfig) -> Result<Arc<Self>, GatewayError> {
        let registry = Arc::new(BrRegistry::with_timeout(config.heartbeat_timeout));
        let topology = Arc::new(TopologyAggregator::new(config.mesh_local_prefix));
        let inventory = Arc::new(NodeInventory::new(&config.inventory_path));
        let credentials = Arc::new(BrCredentials::open(&config.credentials_path)?);
        let mapping = Arc::new(NodeAddressMap::new());
        let resolver = NameResolver::new(
            Arc::clone(&inventory),
            Arc::clone(&topology),
            Arc::clone(&mapping),
        );
        let coap = CoapClient::new().with_timeout(config.coap_timeout);

        Ok(Arc::new(Self {
            config,
            registry,
            topology,
            inventory,
            credentials,
            mapping,
            resolver,
            bus: EventBus::new(),
            coap,
            connections: DashMap::new(),
        }))
    }
}
