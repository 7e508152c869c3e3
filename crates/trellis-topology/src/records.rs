//! Aggregated topology records and snapshot types.

use std::collections::BTreeSet;

use serde::Serialize;
use trellis_core::{ExtAddr, Rloc16, Role};

/// Unique identity of a physical node: partition plus EUI-64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    /// Thread partition id.
    pub partition: u32,
    /// EUI-64 extended address.
    pub ext_addr: ExtAddr,
}

/// Everything observed about one node, accumulated over time.
#[derive(Debug, Clone, Serialize)]
pub struct NodeRecord {
    /// Thread partition id.
    pub partition_id: u32,
    /// EUI-64 (lowercase hex in serialized form).
    pub ext_addr: ExtAddr,
    /// All RLOC16s seen for this node (they change on renumbering).
    pub rloc16s: BTreeSet<Rloc16>,
    /// All ML-EIDs seen (lowercase).
    pub mleids: BTreeSet<String>,
    /// All roles reported; conflicting reports are retained.
    pub roles: BTreeSet<Role>,
    /// Which BRs have reported this node.
    pub br_ids: BTreeSet<String>,
    /// Sticky border-router flag.
    pub is_br: bool,
    /// Epoch seconds of the most recent observation.
    pub last_seen: f64,
}

impl NodeRecord {
    pub(crate) fn new(partition: u32, ext_addr: ExtAddr) -> Self {
        Self {
            partition_id: partition,
            ext_addr,
            rloc16s: BTreeSet::new(),
            mleids: BTreeSet::new(),
            roles: BTreeSet::new(),
            br_ids: BTreeSet::new(),
            is_br: false,
            last_seen: 0.0,
        }
    }

    /// The strongest reported role: leader > router > reed > child.
    #[must_use]
    pub fn strongest_role(&self) -> Option<Role> {
        self.roles.iter().max().copied()
    }
}

/// Radio metrics for an undirected router↔router link.
///
/// A newer sample replaces the whole record: all metrics move
/// together.
#[derive(Debug, Clone, Serialize)]
pub struct RouterLinkRecord {
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
    /// Epoch seconds of the sample.
    pub last_seen: f64,
}

/// Radio metrics for a directed parent→child link.
#[derive(Debug, Clone, Serialize)]
pub struct ChildLinkRecord {
    /// Average RSSI (dBm).
    pub avg_rssi: Option<i32>,
    /// Most recent RSSI (dBm).
    pub last_rssi: Option<i32>,
    /// Link quality indicator.
    pub lqi: Option<u8>,
    /// Child mode (`rx-on`/`mtd`/`sed`).
    pub mode: Option<String>,
    /// Thread protocol version.
    pub version: Option<u32>,
    /// Epoch seconds of the sample.
    pub last_seen: f64,
}

/// A router link with its endpoints, as exported by snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct RouterLinkSnapshot {
    /// Lower endpoint RLOC16.
    pub a_rloc16: Rloc16,
    /// Higher endpoint RLOC16.
    pub b_rloc16: Rloc16,
    /// Link metrics.
    #[serde(flatten)]
    pub link: RouterLinkRecord,
}

/// A child link with its endpoints, as exported by snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct ChildLinkSnapshot {
    /// Parent RLOC16.
    pub parent_rloc16: Rloc16,
    /// Child RLOC16.
    pub child_rloc16: Rloc16,
    /// Link metrics.
    #[serde(flatten)]
    pub link: ChildLinkRecord,
}

/// Summary statistics attached to a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TopologyStats {
    /// Distinct nodes across all partitions.
    pub total_nodes: usize,
    /// Distinct router links.
    pub total_router_links: usize,
    /// Distinct child links.
    pub total_child_links: usize,
    /// Monotonic mutation counter at snapshot time.
    pub generation: u64,
    /// Epoch seconds the snapshot was taken.
    pub timestamp: f64,
}

/// A stable, JSON-serializable view of the whole topology.
#[derive(Debug, Clone, Serialize)]
pub struct TopologySnapshot {
    /// Node records, ordered by (partition, ext_addr).
    pub nodes: Vec<NodeRecord>,
    /// Router links, ordered by endpoints.
    pub router_links: Vec<RouterLinkSnapshot>,
    /// Child links, ordered by endpoints.
    pub child_links: Vec<ChildLinkSnapshot>,
    /// Summary statistics.
    pub stats: TopologyStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strongest_role_prefers_leader() {
        let mut record = NodeRecord::new(1, "0123456789abcdef".parse().unwrap());
        assert_eq!(record.strongest_role(), None);
        record.roles.insert(Role::Child);
        record.roles.insert(Role::Leader);
        record.roles.insert(Role::Router);
        assert_eq!(record.strongest_role(), Some(Role::Leader));
    }

    #[test]
    fn node_record_serializes_sets_as_arrays() {
        let mut record = NodeRecord::new(0x1a2b, "0123456789abcdef".parse().unwrap());
        record.rloc16s.insert(Rloc16(0xc400));
        record.rloc16s.insert(Rloc16(0xc800));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["partition_id"], 0x1a2b);
        assert_eq!(json["ext_addr"], "0123456789abcdef");
        assert_eq!(
            json["rloc16s"],
            serde_json::json!(["0xc400", "0xc800"])
        );
    }
}
