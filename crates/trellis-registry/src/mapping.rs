//! Dynamic IPv6 → (business name, owning BR) mapping.
//!
//! Built from three sources: config-file ML-EID matches, topology
//! back-resolution, and synthesized `unknown-…` names. Entries refresh
//! on every observed event; an entry is "active" while its last-seen
//! age is inside the configured window (default 60 s).

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;
use trellis_core::epoch_secs;

/// Default active-node window.
pub const DEFAULT_ACTIVE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct MappingEntry {
    node_name: String,
    br_id: String,
    last_seen: Instant,
    last_seen_epoch: f64,
}

/// A recently-active node, as reported by [`NodeAddressMap::active_nodes`].
#[derive(Debug, Clone, Serialize)]
pub struct ActiveNode {
    /// Business name (possibly synthesized).
    pub name: String,
    /// The IPv6 the node was last seen at.
    pub ipv6: String,
    /// Owning Border Router.
    pub br_id: String,
    /// Epoch seconds of the last event.
    pub last_seen: f64,
    /// Age of the last event in whole seconds.
    pub seconds_ago: u64,
}

/// Concurrent IPv6 → name/BR table. Keys are lowercased.
#[derive(Debug, Default)]
pub struct NodeAddressMap {
    entries: DashMap<String, MappingEntry>,
}

impl NodeAddressMap {
    /// Empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `ipv6` belongs to `node_name` behind `br_id`.
    ///
    /// Called on every enriched event; refreshes last-seen.
    pub fn update(&self, ipv6: &str, node_name: &str, br_id: &str) {
        self.entries.insert(
            ipv6.to_ascii_lowercase(),
            MappingEntry {
                node_name: node_name.to_string(),
                br_id: br_id.to_string(),
                last_seen: Instant::now(),
                last_seen_epoch: epoch_secs(),
            },
        );
        debug!(ipv6, node_name, br_id, "Address mapping updated");
    }

    /// Whether the address has ever been mapped.
    #[must_use]
    pub fn contains(&self, ipv6: &str) -> bool {
        self.entries.contains_key(&ipv6.to_ascii_lowercase())
    }

    /// The mapped business name for an address.
    #[must_use]
    pub fn name_for(&self, ipv6: &str) -> Option<String> {
        self.entries
            .get(&ipv6.to_ascii_lowercase())
            .map(|entry| entry.node_name.clone())
    }

    /// The BR a node was last seen behind.
    #[must_use]
    pub fn br_for_node(&self, node_name: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|entry| entry.node_name == node_name)
            .map(|entry| entry.br_id.clone())
    }

    /// The BR an address was last seen behind.
    #[must_use]
    pub fn br_for_address(&self, ipv6: &str) -> Option<String> {
        self.entries
            .get(&ipv6.to_ascii_lowercase())
            .map(|entry| entry.br_id.clone())
    }

    /// Nodes with an event inside `window`, most recent first.
    #[must_use]
    pub fn active_nodes(&self, window: Duration) -> Vec<ActiveNode> {
        let mut active: Vec<ActiveNode> = self
            .entries
            .iter()
            .filter_map(|item| {
                let age = item.value().last_seen.elapsed();
                (age <= window).then(|| ActiveNode {
                    name: item.value().node_name.clone(),
                    ipv6: item.key().clone(),
                    br_id: item.value().br_id.clone(),
                    last_seen: item.value().last_seen_epoch,
                    seconds_ago: age.as_secs(),
                })
            })
            .collect();
        active.sort_by(|a, b| {
            b.last_seen
                .partial_cmp(&a.last_seen)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        active
    }

    /// Total mapped addresses (active or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
