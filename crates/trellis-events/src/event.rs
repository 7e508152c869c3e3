//! Event types published by the gateway.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An enriched event on one of the bus's named channels.
///
/// Field names mirror the frames observers historically received, so a
/// serialized event is directly forwardable to a web client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum MeshEvent {
    /// A node-originated event (button, battery, BLE beacon, ...),
    /// already resolved to a business name.
    NodeEvent {
        /// Business name (possibly synthesized `unknown-…`).
        node: String,
        /// Reporting Border Router.
        br_id: String,
        /// Source IPv6 as reported.
        ipv6: String,
        /// Event kind (`button`, `battery`, `ble_beacon`, ...).
        event_type: String,
        /// Opaque event payload.
        payload: Value,
        /// Epoch seconds.
        timestamp: f64,
    },

    /// A node announced itself to a BR.
    NodeDiscovered {
        /// Business name (possibly synthesized).
        node_name: String,
        /// Announced IPv6.
        ipv6: String,
        /// Reporting Border Router.
        br_id: String,
        /// Epoch seconds.
        timestamp: f64,
    },

    /// A node was seen for the first time (fresh dynamic-mapping entry).
    NodeUpdate {
        /// Business name (possibly synthesized).
        node_name: String,
        /// The address it was seen at.
        ipv6: String,
        /// Reporting Border Router.
        br_id: String,
        /// Epoch seconds.
        timestamp: f64,
    },

    /// A downstream command completed (correlated by request id).
    CommandCompleted {
        /// Request id from the original command frame.
        request_id: String,
        /// Target node, when the BR echoed it.
        node: Option<String>,
        /// Responding Border Router.
        br_id: String,
        /// BR-reported status.
        status: Option<String>,
        /// BR-reported result object.
        result: Value,
        /// BR-reported error, if any.
        error: Option<String>,
        /// Epoch seconds.
        timestamp: f64,
    },

    /// A Network Diagnostic node observation was aggregated.
    DiagnosticNode {
        /// Reporting Border Router.
        br_id: String,
        /// Business name resolved from the node's ML-EIDs.
        node_name: Option<String>,
        /// Thread partition id.
        partition: u32,
        /// EUI-64 (lowercase hex).
        ext_addr: String,
        /// Epoch seconds.
        timestamp: f64,
    },

    /// A router↔router link sample was aggregated.
    DiagnosticLink {
        /// Reporting Border Router.
        br_id: String,
        /// One endpoint.
        a_rloc16: String,
        /// Other endpoint.
        b_rloc16: String,
        /// Epoch seconds.
        timestamp: f64,
    },

    /// A parent→child link sample was aggregated.
    DiagnosticChild {
        /// Reporting Border Router.
        br_id: String,
        /// Parent router RLOC16.
        parent_rloc16: String,
        /// Child RLOC16.
        child_rloc16: String,
        /// Epoch seconds.
        timestamp: f64,
    },

    /// A BR replaced its declared node list.
    TopologyUpdate {
        /// Reporting Border Router.
        br_id: String,
        /// New declared-node count.
        nodes_count: usize,
        /// Epoch seconds.
        timestamp: f64,
    },

    /// A BR-proxied node scan returned.
    ScanNodeResult {
        /// Reporting Border Router.
        br_id: String,
        /// Scanned node's business name, when known.
        node_name: Option<String>,
        /// Scanned address.
        target_ipv6: Option<String>,
        /// Correlating request id.
        request_id: Option<String>,
        /// Whether the scan succeeded.
        success: bool,
        /// The node's reported network view.
        network_info: Value,
        /// Epoch seconds.
        timestamp: f64,
    },
}

impl MeshEvent {
    /// The named channel this event is published on.
    #[must_use]
    pub fn channel(&self) -> &'static str {
        match self {
            Self::NodeEvent { .. } => "node_event",
            Self::NodeDiscovered { .. } => "node_discovered",
            Self::NodeUpdate { .. } => "node_update",
            Self::CommandCompleted { .. } => "command_completed",
            Self::DiagnosticNode { .. } => "diagnostic_node",
            Self::DiagnosticLink { .. } => "diagnostic_link",
            Self::DiagnosticChild { .. } => "diagnostic_child",
            Self::TopologyUpdate { .. } => "topology_update",
            Self::ScanNodeResult { .. } => "scan_node_result",
        }
    }
}
