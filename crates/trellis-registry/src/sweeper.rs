//! Background liveness sweeper.
//!
//! Wakes every [`SWEEP_PERIOD`], flips heartbeat-expired sessions
//! offline, and drives topology retention eviction. One sweeper per
//! process, spawned at gateway startup.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use trellis_topology::TopologyAggregator;

use crate::registry::BrRegistry;

/// Sweep interval.
pub const SWEEP_PERIOD: Duration = Duration::from_secs(5);

/// Spawn the liveness sweeper.
///
/// Exits when the shutdown channel fires (or closes). `retention` is
/// the topology retention window: nodes unseen that long are evicted.
#[must_use]
pub fn spawn_sweeper(
    registry: Arc<BrRegistry>,
    topology: Arc<TopologyAggregator>,
    retention: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(
            period_secs = SWEEP_PERIOD.as_secs(),
            retention_secs = retention.as_secs(),
            "Liveness sweeper started"
        );
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Liveness sweeper shutting down");
                    return;
                }
                () = tokio::time::sleep(SWEEP_PERIOD) => {
                    let expired = registry.sweep_expired();
                    if !expired.is_empty() {
                        debug!(count = expired.len(), "Sessions flipped offline");
                    }
                    topology.evict_stale(retention);
                }
            }
        }
    })
}
