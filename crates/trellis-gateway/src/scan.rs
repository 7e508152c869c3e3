//! Scan orchestration: turning one node's network view into topology
//! records and follow-up probes.
//!
//! A successful `scan_node_result` yields the node itself, its router
//! links, and its child links. Every child and non-child neighbor that
//! reports an EUI-64 then gets its own `scan_node`, addressed at the
//! *link-local* address derived from that EUI-64 — link-local is always
//! reachable within one radio hop, which matches the BR↔neighbor proxy
//! relationship, while a RLOC may be stale by the time the probe runs.
//!
//! Discovery entry points: the per-node walk above, the opportunistic
//! scan on first sight of a node, and [`scan_inventory`] over the
//! configured address list. Multicast discovery is not used.

use std::net::Ipv6Addr;

use serde::Deserialize;
use tracing::{debug, info, warn};
use trellis_core::ExtAddr;
use trellis_core::addr::link_local_from_eui64;
use trellis_topology::{ChildLinkSample, DiagnosticNode, RouterLinkSample};

use crate::commands::send_scan_node;
use crate::context::GatewayContext;
use crate::resolver::NameResolver;

/// Reporter id recorded for direct (non-BR-proxied) CoAP probes.
pub const DIRECT_PROBE_REPORTER: &str = "coordinator";

/// CoAP resource answering with a node's network view.
pub const NETWORK_INFO_URI: &str = "network-info";

/// A node's self-reported network view (`network-info` payload,
/// also carried inside `scan_node_result`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkInfo {
    /// The node's own RLOC16.
    pub rloc16: Option<String>,
    /// The node's role.
    pub role: Option<String>,
    /// Parent RLOC16, for end devices.
    pub parent: Option<String>,
    /// Partition id.
    pub partition: Option<u32>,
    /// The node's EUI-64.
    pub ext_addr: Option<String>,
    /// All addresses the node holds.
    #[serde(default)]
    pub ipv6_list: Vec<String>,
    /// Pre-extracted ML-EIDs.
    #[serde(default)]
    pub mleids: Vec<String>,
    /// Attached children.
    #[serde(default)]
    pub children: Vec<PeerInfo>,
    /// Radio neighbors (children may appear here flagged).
    #[serde(default)]
    pub neighbors: Vec<PeerInfo>,
    /// Whether the node is a Border Router.
    #[serde(default)]
    pub is_br: bool,
}

/// One child or neighbor entry in a network view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeerInfo {
    /// Peer RLOC16.
    pub rloc16: Option<String>,
    /// Peer EUI-64, when known — enables the link-local follow-up.
    pub ext_addr: Option<String>,
    /// Set on neighbor entries that are actually children.
    #[serde(default)]
    pub is_child: bool,
    /// Average RSSI (dBm).
    pub avg_rssi: Option<i32>,
    /// Most recent RSSI (dBm).
    pub last_rssi: Option<i32>,
    /// Link quality indicator.
    pub lqi: Option<u8>,
    /// Link margin in dB.
    pub margin_db: Option<i32>,
    /// Frame error rate.
    pub frame_err: Option<f64>,
    /// Message error rate.
    pub msg_err: Option<f64>,
    /// Child mode (`rx-on`/`mtd`/`sed`), child entries only.
    pub mode: Option<String>,
    /// Thread version, child entries only.
    pub version: Option<u32>,
}

/// Fold a network view into the aggregator and schedule follow-ups.
///
/// `reporter` is recorded on the node records; `follow_up_br` names the
/// BR to aim follow-up scans at (`None` disables the walk, used for
/// direct probes that have no proxying BR).
///
/// Returns the number of follow-up scans enqueued.
pub fn ingest_scan_result(
    ctx: &GatewayContext,
    reporter: &str,
    info: &NetworkInfo,
    follow_up_br: Option<&str>,
) -> usize {
    // The scanned node itself.
    ctx.topology.upsert_node(
        &DiagnosticNode {
            partition: info.partition,
            ext_addr: info.ext_addr.clone(),
            rloc16: info.rloc16.clone(),
            role: info.role.clone(),
            ipv6_list: info.ipv6_list.clone(),
            mleids: info.mleids.clone(),
            is_br: info.is_br,
        },
        reporter,
    );

    // Router links to non-child neighbors.
    for neighbor in info.neighbors.iter().filter(|n| !n.is_child) {
        ctx.topology.upsert_router_link(&RouterLinkSample {
            a_rloc16: info.rloc16.clone(),
            b_rloc16: neighbor.rloc16.clone(),
            avg_rssi: neighbor.avg_rssi,
            last_rssi: neighbor.last_rssi,
            lqi: neighbor.lqi,
            margin_db: neighbor.margin_db,
            frame_err: neighbor.frame_err,
            msg_err: neighbor.msg_err,
        });
    }

    // Child links (which also upsert the child nodes).
    for child in &info.children {
        ctx.topology.upsert_child_link(
            &ChildLinkSample {
                parent_rloc16: info.rloc16.clone(),
                child_rloc16: child.rloc16.clone(),
                child_ext_addr: child.ext_addr.clone(),
                partition: info.partition,
                child_mleids: Vec::new(),
                avg_rssi: child.avg_rssi,
                last_rssi: child.last_rssi,
                lqi: child.lqi,
                mode: child.mode.clone(),
                version: child.version,
            },
            reporter,
        );
    }

    let Some(br_id) = follow_up_br else {
        return 0;
    };
    schedule_follow_ups(ctx, br_id, info)
}

/// Enqueue a `scan_node` for every child and non-child neighbor whose
/// EUI-64 is present, addressed link-local.
fn schedule_follow_ups(ctx: &GatewayContext, br_id: &str, info: &NetworkInfo) -> usize {
    let peers = info
        .children
        .iter()
        .chain(info.neighbors.iter().filter(|n| !n.is_child));

    let mut scheduled = 0usize;
    for peer in peers {
        let Some(ext) = peer
            .ext_addr
            .as_deref()
            .and_then(|raw| raw.parse::<ExtAddr>().ok())
        else {
            continue;
        };
        let link_local = link_local_from_eui64(&ext).to_string();
        let name = ctx
            .resolver
            .name_for_ipv6(&link_local)
            .unwrap_or_else(|| NameResolver::synthesized_name(&link_local));

        match send_scan_node(ctx, br_id, &link_local, &name) {
            Ok(_) => scheduled += 1,
            Err(e) => {
                debug!(br_id, target = %link_local, error = %e, "Follow-up scan not enqueued");
            },
        }
    }

    if scheduled > 0 {
        info!(br_id, scheduled, "Follow-up scans enqueued");
    }
    scheduled
}

/// Probe one node directly over CoAP for its network view.
pub async fn probe_node(ctx: &GatewayContext, target: Ipv6Addr) -> Option<NetworkInfo> {
    let value = match ctx.coap.get_json(target, NETWORK_INFO_URI).await {
        Ok(Some(value)) => value,
        Ok(None) => {
            debug!(%target, "Node did not answer network-info probe");
            return None;
        },
        Err(e) => {
            warn!(%target, error = %e, "Direct probe failed");
            return None;
        },
    };
    match serde_json::from_value::<NetworkInfo>(value) {
        Ok(info) => Some(info),
        Err(e) => {
            warn!(%target, error = %e, "Unparseable network-info payload");
            None
        },
    }
}

/// Kick scans for every inventory address.
///
/// Nodes with an online declared BR are scanned through it; the rest
/// are probed directly over CoAP and their views ingested without a
/// follow-up walk. Returns the number of nodes scanned or probed.
pub async fn scan_inventory(ctx: &GatewayContext) -> usize {
    let mut reached = 0usize;

    for name in ctx.inventory.node_names() {
        let Some(address) = ctx.inventory.address_for_name(&name) else {
            continue;
        };

        if let Some(br_id) = ctx.registry.lookup_br_for_node(&name) {
            if send_scan_node(ctx, &br_id, &address, &name).is_ok() {
                reached += 1;
            }
            continue;
        }

        let Ok(target) = address.parse::<Ipv6Addr>() else {
            warn!(node = %name, address, "Inventory address is not valid IPv6");
            continue;
        };
        if let Some(view) = probe_node(ctx, target).await {
            ingest_scan_result(ctx, DIRECT_PROBE_REPORTER, &view, None);
            reached += 1;
        }
    }

    info!(reached, "Inventory scan pass complete");
    reached
}
