//! Node inventory: business name ↔ ML-EID from `adresses.json`.
//!
//! File format:
//!
//! ```json
//! { "nodes": { "n01": { "address": "fd78:...::abcd", "ordre": 1,
//!                       "connexes": ["n02"] } } }
//! ```
//!
//! Lookups are case-insensitive on the IPv6 string and tolerate
//! bracketed `[addr]` input.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::DEFAULT_CACHE_TTL;

/// One inventory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Stable ML-EID of the node.
    pub address: String,
    /// Playback/sequence position; 0 or absent means unordered.
    #[serde(rename = "ordre", default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    /// Names of physically adjacent nodes.
    #[serde(rename = "connexes", default, skip_serializing_if = "Vec::is_empty")]
    pub adjacent: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    nodes: HashMap<String, NodeEntry>,
}

/// An inventory entry paired with its name, sorted by `ordre`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderedNode {
    /// Business name.
    pub name: String,
    /// ML-EID.
    pub address: String,
    /// Sequence position (always > 0 here).
    pub order: u32,
}

struct Cached {
    snapshot: Arc<HashMap<String, NodeEntry>>,
    loaded_at: Instant,
}

/// TTL-cached view of the node inventory file.
pub struct NodeInventory {
    path: PathBuf,
    ttl: Duration,
    cache: Mutex<Option<Cached>>,
}

impl NodeInventory {
    /// Create an inventory reader over `path` with the default TTL.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_ttl(path, DEFAULT_CACHE_TTL)
    }

    /// Create an inventory reader with an explicit cache TTL.
    #[must_use]
    pub fn with_ttl(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot, reloading from disk when the cache is stale.
    ///
    /// A missing or malformed file yields an empty snapshot (the
    /// resolver degrades to synthesized names); the error is logged.
    #[must_use]
    pub fn snapshot(&self) -> Arc<HashMap<String, NodeEntry>> {
        if let Some(fresh) = self.cached_if_fresh() {
            return fresh;
        }
        self.reload()
    }

    /// Force a reload, bypassing the TTL. Used after inventory writes.
    pub fn reload(&self) -> Arc<HashMap<String, NodeEntry>> {
        let snapshot = Arc::new(self.read_file());
        let mut guard = self.lock_cache();
        *guard = Some(Cached {
            snapshot: Arc::clone(&snapshot),
            loaded_at: Instant::now(),
        });
        snapshot
    }

    /// Resolve an IPv6 string to a business name (case-insensitive).
    #[must_use]
    pub fn name_for_address(&self, ipv6: &str) -> Option<String> {
        let needle = normalize_ipv6(ipv6);
        self.snapshot()
            .iter()
            .find(|(_, entry)| entry.address.to_ascii_lowercase() == needle)
            .map(|(name, _)| name.clone())
    }

    /// Resolve a business name to its configured ML-EID.
    #[must_use]
    pub fn address_for_name(&self, name: &str) -> Option<String> {
        self.snapshot().get(name).map(|entry| entry.address.clone())
    }

    /// All configured node names.
    #[must_use]
    pub fn node_names(&self) -> Vec<String> {
        self.snapshot().keys().cloned().collect()
    }

    /// All configured ML-EIDs.
    #[must_use]
    pub fn addresses(&self) -> Vec<String> {
        self.snapshot()
            .values()
            .map(|entry| entry.address.clone())
            .collect()
    }

    /// Nodes with `ordre > 0`, ascending.
    #[must_use]
    pub fn nodes_by_order(&self) -> Vec<OrderedNode> {
        let snapshot = self.snapshot();
        let mut ordered: Vec<OrderedNode> = snapshot
            .iter()
            .filter_map(|(name, entry)| {
                let order = entry.order.filter(|o| *o > 0)?;
                Some(OrderedNode {
                    name: name.clone(),
                    address: entry.address.clone(),
                    order,
                })
            })
            .collect();
        ordered.sort_by_key(|n| n.order);
        ordered
    }

    /// The `connexes` adjacency list for a node.
    #[must_use]
    pub fn adjacent_nodes(&self, name: &str) -> Vec<String> {
        self.snapshot()
            .get(name)
            .map(|entry| entry.adjacent.clone())
            .unwrap_or_default()
    }

    fn cached_if_fresh(&self) -> Option<Arc<HashMap<String, NodeEntry>>> {
        let guard = self.lock_cache();
        guard
            .as_ref()
            .filter(|cached| cached.loaded_at.elapsed() < self.ttl)
            .map(|cached| Arc::clone(&cached.snapshot))
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, Option<Cached>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read_file(&self) -> HashMap<String, NodeEntry> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Node inventory unreadable");
                return HashMap::new();
            },
        };
        match serde_json::from_str::<InventoryFile>(&text) {
            Ok(file) => {
                debug!(
                    path = %self.path.display(),
                    nodes = file.nodes.len(),
                    "Node inventory loaded"
                );
                file.nodes
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Node inventory malformed");
                HashMap::new()
            },
        }
    }
}

/// Lowercase and strip a bracketed `[addr]` wrapper.
fn normalize_ipv6(ipv6: &str) -> String {
    let trimmed = ipv6
        .strip_prefix('[')
        .and_then(|rest| rest.split(']').next())
        .unwrap_or(ipv6);
    trimmed.to_ascii_lowercase()
}
