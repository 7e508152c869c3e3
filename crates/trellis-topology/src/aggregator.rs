//! The aggregator itself: three tables, one lock each, a generation
//! counter read by snapshots.

use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, info, trace};
use trellis_core::{AddrClass, ExtAddr, Ipv6Prefix, Rloc16, Role, classify, epoch_secs};

use crate::records::{
    ChildLinkRecord, ChildLinkSnapshot, NodeKey, NodeRecord, RouterLinkRecord,
    RouterLinkSnapshot, TopologySnapshot, TopologyStats,
};
use crate::sample::{ChildLinkSample, DiagnosticNode, RouterLinkSample};

/// Mesh-local prefix covering most Thread networks, used when no
/// operational dataset is configured.
const DEFAULT_MESH_LOCAL: &str = "fd00::/8";

/// Aggregates diagnostic samples from any number of BRs into a
/// deduplicated topology.
///
/// Upserts never erase prior observations: set-valued fields
/// accumulate, link metrics are replaced wholesale by the newest
/// sample.
pub struct TopologyAggregator {
    mesh_local: Ipv6Prefix,
    nodes: Mutex<HashMap<NodeKey, NodeRecord>>,
    router_links: Mutex<HashMap<(Rloc16, Rloc16), RouterLinkRecord>>,
    child_links: Mutex<HashMap<(Rloc16, Rloc16), ChildLinkRecord>>,
    generation: AtomicU64,
}

impl TopologyAggregator {
    /// Create an aggregator classifying ML-EIDs against `mesh_local`.
    #[must_use]
    pub fn new(mesh_local: Ipv6Prefix) -> Self {
        info!(%mesh_local, "Topology aggregator initialized");
        Self {
            mesh_local,
            nodes: Mutex::new(HashMap::new()),
            router_links: Mutex::new(HashMap::new()),
            child_links: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// The configured mesh-local prefix.
    #[must_use]
    pub fn mesh_local(&self) -> &Ipv6Prefix {
        &self.mesh_local
    }

    /// ML-EIDs from an address list: inside the mesh-local prefix and
    /// not a locator. Unparseable entries are skipped.
    #[must_use]
    pub fn extract_mleids(&self, addresses: &[String]) -> Vec<String> {
        addresses
            .iter()
            .filter_map(|raw| {
                let parsed: Ipv6Addr = raw.parse().ok()?;
                (classify(&parsed, &self.mesh_local) == AddrClass::MeshLocalEid)
                    .then(|| parsed.to_string().to_ascii_lowercase())
            })
            .collect()
    }

    /// Add or refresh a node from a diagnostic observation.
    ///
    /// Samples lacking partition or ext_addr identify nothing and are
    /// dropped without error. Returns the post-upsert record.
    pub fn upsert_node(&self, sample: &DiagnosticNode, br_id: &str) -> Option<NodeRecord> {
        let Some(partition) = sample.partition else {
            debug!("Node sample without partition dropped");
            return None;
        };
        let Some(ext_addr) = sample
            .ext_addr
            .as_deref()
            .and_then(|raw| raw.parse::<ExtAddr>().ok())
        else {
            debug!("Node sample without ext_addr dropped");
            return None;
        };

        let mleids = if sample.mleids.is_empty() {
            self.extract_mleids(&sample.ipv6_list)
        } else {
            sample
                .mleids
                .iter()
                .map(|m| m.to_ascii_lowercase())
                .collect()
        };

        let key = NodeKey {
            partition,
            ext_addr,
        };
        let record = {
            let mut nodes = lock(&self.nodes);
            let node = nodes
                .entry(key)
                .or_insert_with(|| NodeRecord::new(partition, ext_addr));

            if let Some(rloc) = sample
                .rloc16
                .as_deref()
                .and_then(|raw| raw.parse::<Rloc16>().ok())
            {
                node.rloc16s.insert(rloc);
            }
            if let Some(role) = sample
                .role
                .as_deref()
                .and_then(|raw| raw.parse::<Role>().ok())
            {
                node.roles.insert(role);
            }
            if sample.is_br {
                node.is_br = true;
            }
            node.mleids.extend(mleids);
            node.br_ids.insert(br_id.to_string());
            node.last_seen = epoch_secs();
            node.clone()
        };
        self.bump();

        trace!(
            ext_addr = %ext_addr,
            partition,
            rloc16s = record.rloc16s.len(),
            mleids = record.mleids.len(),
            "Node upserted"
        );
        Some(record)
    }

    /// Add or replace an undirected router↔router link.
    ///
    /// The key is the sorted endpoint pair; the newest sample wins on
    /// every metric at once. Returns the normalized key.
    pub fn upsert_router_link(&self, sample: &RouterLinkSample) -> Option<(Rloc16, Rloc16)> {
        let a = sample
            .a_rloc16
            .as_deref()
            .and_then(|raw| raw.parse::<Rloc16>().ok());
        let b = sample
            .b_rloc16
            .as_deref()
            .and_then(|raw| raw.parse::<Rloc16>().ok());
        let (Some(a), Some(b)) = (a, b) else {
            debug!("Router link sample without both rloc16s dropped");
            return None;
        };

        let key = if a <= b { (a, b) } else { (b, a) };
        {
            let mut links = lock(&self.router_links);
            links.insert(
                key,
                RouterLinkRecord {
                    avg_rssi: sample.avg_rssi,
                    last_rssi: sample.last_rssi,
                    lqi: sample.lqi,
                    margin_db: sample.margin_db,
                    frame_err: sample.frame_err,
                    msg_err: sample.msg_err,
                    last_seen: epoch_secs(),
                },
            );
        }
        self.bump();

        trace!(a = %key.0, b = %key.1, rssi = ?sample.avg_rssi, "Router link upserted");
        Some(key)
    }

    /// Add or replace a parent→child link; when the sample identifies
    /// the child (`child_ext_addr` + `partition`), the child is also
    /// upserted as a node with role `child`.
    pub fn upsert_child_link(
        &self,
        sample: &ChildLinkSample,
        br_id: &str,
    ) -> Option<(Rloc16, Rloc16)> {
        let parent = sample
            .parent_rloc16
            .as_deref()
            .and_then(|raw| raw.parse::<Rloc16>().ok());
        let child = sample
            .child_rloc16
            .as_deref()
            .and_then(|raw| raw.parse::<Rloc16>().ok());
        let (Some(parent), Some(child)) = (parent, child) else {
            debug!("Child link sample without parent or child rloc16 dropped");
            return None;
        };

        {
            let mut links = lock(&self.child_links);
            links.insert(
                (parent, child),
                ChildLinkRecord {
                    avg_rssi: sample.avg_rssi,
                    last_rssi: sample.last_rssi,
                    lqi: sample.lqi,
                    mode: sample.mode.clone(),
                    version: sample.version,
                    last_seen: epoch_secs(),
                },
            );
        }
        self.bump();

        if sample.child_ext_addr.is_some() && sample.partition.is_some() {
            let child_node = DiagnosticNode {
                partition: sample.partition,
                ext_addr: sample.child_ext_addr.clone(),
                rloc16: Some(child.to_string()),
                role: Some("child".to_string()),
                mleids: sample.child_mleids.clone(),
                ..DiagnosticNode::default()
            };
            self.upsert_node(&child_node, br_id);
        }

        trace!(parent = %parent, child = %child, "Child link upserted");
        Some((parent, child))
    }

    /// The node (any partition) currently holding `rloc16`.
    #[must_use]
    pub fn find_by_rloc16(&self, rloc16: Rloc16) -> Option<NodeRecord> {
        lock(&self.nodes)
            .values()
            .find(|node| node.rloc16s.contains(&rloc16))
            .cloned()
    }

    /// The node owning the given ML-EID (case-insensitive).
    #[must_use]
    pub fn find_by_mleid(&self, mleid: &str) -> Option<NodeRecord> {
        let needle = mleid.to_ascii_lowercase();
        lock(&self.nodes)
            .values()
            .find(|node| node.mleids.contains(&needle))
            .cloned()
    }

    /// A stable snapshot of all three tables plus statistics.
    #[must_use]
    pub fn snapshot(&self) -> TopologySnapshot {
        let mut nodes: Vec<NodeRecord> = lock(&self.nodes).values().cloned().collect();
        nodes.sort_by_key(|n| (n.partition_id, n.ext_addr));

        let mut router_links: Vec<RouterLinkSnapshot> = lock(&self.router_links)
            .iter()
            .map(|((a, b), link)| RouterLinkSnapshot {
                a_rloc16: *a,
                b_rloc16: *b,
                link: link.clone(),
            })
            .collect();
        router_links.sort_by_key(|l| (l.a_rloc16, l.b_rloc16));

        let mut child_links: Vec<ChildLinkSnapshot> = lock(&self.child_links)
            .iter()
            .map(|((parent, child), link)| ChildLinkSnapshot {
                parent_rloc16: *parent,
                child_rloc16: *child,
                link: link.clone(),
            })
            .collect();
        child_links.sort_by_key(|l| (l.parent_rloc16, l.child_rloc16));

        let stats = TopologyStats {
            total_nodes: nodes.len(),
            total_router_links: router_links.len(),
            total_child_links: child_links.len(),
            generation: self.generation.load(Ordering::Relaxed),
            timestamp: epoch_secs(),
        };

        TopologySnapshot {
            nodes,
            router_links,
            child_links,
            stats,
        }
    }

    /// Wipe all tables. Used for a manual full refresh.
    pub fn clear(&self) {
        lock(&self.nodes).clear();
        lock(&self.router_links).clear();
        lock(&self.child_links).clear();
        self.bump();
        info!("Topology data cleared");
    }

    /// Drop nodes and links not seen within `window`.
    ///
    /// Returns the number of evicted records. A node is present iff
    /// some BR reported it within the retention window.
    pub fn evict_stale(&self, window: Duration) -> usize {
        let cutoff = epoch_secs() - window.as_secs_f64();
        let mut evicted = 0usize;

        {
            let mut nodes = lock(&self.nodes);
            let before = nodes.len();
            nodes.retain(|_, node| node.last_seen >= cutoff);
            evicted += before - nodes.len();
        }
        {
            let mut links = lock(&self.router_links);
            let before = links.len();
            links.retain(|_, link| link.last_seen >= cutoff);
            evicted += before - links.len();
        }
        {
            let mut links = lock(&self.child_links);
            let before = links.len();
            links.retain(|_, link| link.last_seen >= cutoff);
            evicted += before - links.len();
        }

        if evicted > 0 {
            self.bump();
            debug!(evicted, "Stale topology records evicted");
        }
        evicted
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for TopologyAggregator {
    fn default() -> Self {
        #[allow(clippy::expect_used)]
        let prefix = DEFAULT_MESH_LOCAL
            .parse()
            .expect("default mesh-local prefix is valid");
        Self::new(prefix)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
