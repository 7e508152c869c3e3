//! The Border Router session registry.
//!
//! One record per BR id. A reconnecting BR supersedes its prior
//! session: the old session id stops matching, so a late teardown from
//! the old connection cannot disturb the new one. Offline records are
//! retained for statistics.
//!
//! Liveness is computed inline under the single state lock (a record is
//! online iff its status says so *and* its last heartbeat is younger
//! than the timeout) — no method re-enters another public method, so a
//! plain mutex suffices.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default heartbeat timeout before a session is considered dead.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opaque id of one WebSocket session.
///
/// A fresh id is minted per accepted connection; registry operations
/// that take a `SessionId` no-op when the id has been superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Mint a fresh session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Connection status of a BR record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrStatus {
    /// Session registered and not timed out.
    Online,
    /// Disconnected or heartbeat-expired.
    Offline,
}

#[derive(Debug)]
struct BrRecord {
    session: SessionId,
    network_prefix: String,
    nodes: Vec<String>,
    status: BrStatus,
    connected_at: DateTime<Utc>,
    disconnected_at: Option<DateTime<Utc>>,
    last_heartbeat: Instant,
    last_heartbeat_at: DateTime<Utc>,
    heartbeat_count: u64,
    nodes_count: usize,
    commands_sent: u64,
    events_received: u64,
}

impl BrRecord {
    fn new(session: SessionId, network_prefix: String, nodes: Vec<String>) -> Self {
        let nodes_count = nodes.len();
        Self {
            session,
            network_prefix,
            nodes,
            status: BrStatus::Online,
            connected_at: Utc::now(),
            disconnected_at: None,
            last_heartbeat: Instant::now(),
            last_heartbeat_at: Utc::now(),
            heartbeat_count: 0,
            nodes_count,
            commands_sent: 0,
            events_received: 0,
        }
    }

    fn heartbeat_alive(&self, timeout: Duration) -> bool {
        self.last_heartbeat.elapsed() < timeout
    }

    fn is_online(&self, timeout: Duration) -> bool {
        self.status == BrStatus::Online && self.heartbeat_alive(timeout)
    }
}

#[derive(Default)]
struct RegistryState {
    records: HashMap<String, BrRecord>,
    node_to_br: HashMap<String, String>,
}

/// Serializable view of one BR record.
#[derive(Debug, Clone, Serialize)]
pub struct BrSessionSnapshot {
    /// BR id.
    pub br_id: String,
    /// Current session id.
    pub session: SessionId,
    /// Effective status (record status combined with liveness).
    pub status: BrStatus,
    /// Declared Thread network prefix.
    pub network_prefix: String,
    /// Declared node names.
    pub nodes: Vec<String>,
    /// Last reported node count.
    pub nodes_count: usize,
    /// Connection wall time.
    pub connected_at: DateTime<Utc>,
    /// Disconnection wall time, when offline.
    pub disconnected_at: Option<DateTime<Utc>>,
    /// Last heartbeat wall time.
    pub last_heartbeat: DateTime<Utc>,
    /// Heartbeats received this session.
    pub heartbeat_count: u64,
    /// Seconds since the last heartbeat.
    pub time_since_heartbeat: f64,
    /// Commands sent to this BR.
    pub commands_sent: u64,
    /// Events received from this BR.
    pub events_received: u64,
}

/// Fleet-wide statistics.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    /// All records, online or not.
    pub total_border_routers: usize,
    /// Currently-live sessions.
    pub online_border_routers: usize,
    /// Retained offline records.
    pub offline_border_routers: usize,
    /// Distinct nodes in the node→BR index.
    pub total_nodes: usize,
    /// Commands sent, summed over all BRs.
    pub total_commands_sent: u64,
    /// Events received, summed over all BRs.
    pub total_events_received: u64,
    /// Configured heartbeat timeout in seconds.
    pub heartbeat_timeout: u64,
}

/// Concurrency-safe table of BR sessions.
pub struct BrRegistry {
    heartbeat_timeout: Duration,
    state: Mutex<RegistryState>,
}

impl BrRegistry {
    /// Registry with the default 30 s heartbeat timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_HEARTBEAT_TIMEOUT)
    }

    /// Registry with an explicit heartbeat timeout.
    #[must_use]
    pub fn with_timeout(heartbeat_timeout: Duration) -> Self {
        Self {
            heartbeat_timeout,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// The configured heartbeat timeout.
    #[must_use]
    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_timeout
    }

    /// Register a BR session, superseding any prior session.
    ///
    /// The record is rebuilt from scratch (counters restart with the
    /// session) and the node→BR index is repointed at this BR.
    pub fn register(
        &self,
        br_id: &str,
        session: SessionId,
        network_prefix: &str,
        nodes: Vec<String>,
    ) {
        let mut state = self.lock();

        if let Some(old) = state.records.get(br_id) {
            info!(br_id, old_session = %old.session, new_session = %session,
                  "Border Router reconnected, superseding prior session");
            let old_nodes = old.nodes.clone();
            remove_node_index(&mut state, br_id, &old_nodes);
        }

        for node in &nodes {
            state.node_to_br.insert(node.clone(), br_id.to_string());
        }
        let record = BrRecord::new(session, network_prefix.to_string(), nodes);
        info!(br_id, %session, nodes = record.nodes_count, "Border Router registered");
        state.records.insert(br_id.to_string(), record);
    }

    /// Mark a session offline.
    ///
    /// No-op when `session` is not the current session for `br_id`
    /// (superseded, or already torn down) — this is what makes gateway
    /// teardown idempotent. The record is kept for statistics.
    pub fn unregister(&self, br_id: &str, session: SessionId) {
        let mut state = self.lock();
        let Some(record) = state.records.get(br_id) else {
            return;
        };
        if record.session != session {
            debug!(br_id, %session, "Stale unregister ignored");
            return;
        }
        let nodes = record.nodes.clone();
        remove_node_index(&mut state, br_id, &nodes);

        if let Some(record) = state.records.get_mut(br_id) {
            record.status = BrStatus::Offline;
            record.disconnected_at = Some(Utc::now());
        }
        warn!(br_id, "Border Router disconnected");
    }

    /// Refresh a BR's heartbeat.
    ///
    /// Flips the record back online when it had expired. Returns
    /// `false` when the BR has no record at all (first contact — the
    /// gateway auto-registers it).
    pub fn update_heartbeat(&self, br_id: &str, nodes_count: Option<usize>) -> bool {
        let mut state = self.lock();
        let Some(record) = state.records.get_mut(br_id) else {
            warn!(br_id, "Heartbeat from unknown Border Router");
            return false;
        };

        record.last_heartbeat = Instant::now();
        record.last_heartbeat_at = Utc::now();
        record.heartbeat_count += 1;
        if let Some(count) = nodes_count {
            record.nodes_count = count;
        }
        if record.status == BrStatus::Offline {
            record.status = BrStatus::Online;
            record.disconnected_at = None;
            info!(br_id, "Border Router back online");
        }
        true
    }

    /// Whether the BR is online and heartbeat-alive.
    #[must_use]
    pub fn is_online(&self, br_id: &str) -> bool {
        let state = self.lock();
        state
            .records
            .get(br_id)
            .is_some_and(|record| record.is_online(self.heartbeat_timeout))
    }

    /// The online BR that declared `node_name`, if any.
    #[must_use]
    pub fn lookup_br_for_node(&self, node_name: &str) -> Option<String> {
        let state = self.lock();
        let br_id = state.node_to_br.get(node_name)?;
        state
            .records
            .get(br_id)
            .filter(|record| record.is_online(self.heartbeat_timeout))
            .map(|_| br_id.clone())
    }

    /// The current session id for an online BR.
    #[must_use]
    pub fn session_for(&self, br_id: &str) -> Option<SessionId> {
        let state = self.lock();
        state
            .records
            .get(br_id)
            .filter(|record| record.status == BrStatus::Online)
            .map(|record| record.session)
    }

    /// Count one command sent to `br_id`.
    pub fn increment_command_counter(&self, br_id: &str) {
        if let Some(record) = self.lock().records.get_mut(br_id) {
            record.commands_sent += 1;
        }
    }

    /// Count one event received from `br_id`.
    pub fn increment_event_counter(&self, br_id: &str) {
        if let Some(record) = self.lock().records.get_mut(br_id) {
            record.events_received += 1;
        }
    }

    /// Replace a BR's declared node list and re-point the index.
    pub fn update_nodes_list(&self, br_id: &str, nodes: Vec<String>) {
        let mut state = self.lock();
        if !state.records.contains_key(br_id) {
            return;
        }
        let old_nodes = state
            .records
            .get(br_id)
            .map(|record| record.nodes.clone())
            .unwrap_or_default();
        remove_node_index(&mut state, br_id, &old_nodes);
        for node in &nodes {
            state.node_to_br.insert(node.clone(), br_id.to_string());
        }
        if let Some(record) = state.records.get_mut(br_id) {
            record.nodes_count = nodes.len();
            record.nodes = nodes;
            info!(br_id, nodes = record.nodes_count, "Declared node list updated");
        }
    }

    /// Stable snapshot of every record, ordered by BR id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<BrSessionSnapshot> {
        let state = self.lock();
        let mut snapshots: Vec<BrSessionSnapshot> = state
            .records
            .iter()
            .map(|(br_id, record)| BrSessionSnapshot {
                br_id: br_id.clone(),
                session: record.session,
                status: if record.is_online(self.heartbeat_timeout) {
                    BrStatus::Online
                } else {
                    BrStatus::Offline
                },
                network_prefix: record.network_prefix.clone(),
                nodes: record.nodes.clone(),
                nodes_count: record.nodes_count,
                connected_at: record.connected_at,
                disconnected_at: record.disconnected_at,
                last_heartbeat: record.last_heartbeat_at,
                heartbeat_count: record.heartbeat_count,
                time_since_heartbeat: record.last_heartbeat.elapsed().as_secs_f64(),
                commands_sent: record.commands_sent,
                events_received: record.events_received,
            })
            .collect();
        snapshots.sort_by(|a, b| a.br_id.cmp(&b.br_id));
        snapshots
    }

    /// Fleet-wide statistics.
    #[must_use]
    pub fn statistics(&self) -> RegistryStats {
        let state = self.lock();
        let total = state.records.len();
        let online = state
            .records
            .values()
            .filter(|record| record.is_online(self.heartbeat_timeout))
            .count();
        RegistryStats {
            total_border_routers: total,
            online_border_routers: online,
            offline_border_routers: total - online,
            total_nodes: state.node_to_br.len(),
            total_commands_sent: state.records.values().map(|r| r.commands_sent).sum(),
            total_events_received: state.records.values().map(|r| r.events_received).sum(),
            heartbeat_timeout: self.heartbeat_timeout.as_secs(),
        }
    }

    /// Flip heartbeat-expired sessions offline; returns their ids.
    ///
    /// Called by the sweeper every period.
    pub fn sweep_expired(&self) -> Vec<String> {
        let mut state = self.lock();
        let timeout = self.heartbeat_timeout;
        let mut expired = Vec::new();
        for (br_id, record) in &mut state.records {
            if record.status == BrStatus::Online && !record.heartbeat_alive(timeout) {
                record.status = BrStatus::Offline;
                record.disconnected_at = Some(Utc::now());
                expired.push(br_id.clone());
            }
        }
        for br_id in &expired {
            warn!(
                br_id,
                timeout_secs = timeout.as_secs(),
                "Border Router heartbeat expired"
            );
        }
        expired
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for BrRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop index entries that point at `br_id` for the given nodes.
fn remove_node_index(state: &mut RegistryState, br_id: &str, nodes: &[String]) {
    for node in nodes {
        if state.node_to_br.get(node).is_some_and(|owner| owner == br_id) {
            state.node_to_br.remove(node);
        }
    }
}
