//! Downstream command frames and routing.
//!
//! Commands travel coordinator → BR as JSON text tagged by `command`;
//! the BR proxies them onto the mesh as CoAP and answers with a
//! `command_response` correlated by `request_id`.
//!
//! Success at this layer means *enqueued on the owning BR's outbound
//! queue*, never end-to-end delivery.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::GatewayContext;
use crate::session;

/// A command frame for a Border Router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BrCommand {
    /// Proxy a CoAP request to `target_ipv6`.
    SendCoap {
        /// Destination node address.
        target_ipv6: String,
        /// Resource to hit (`audio`, `led`, ...).
        command_type: String,
        /// Opaque payload (`play:341`, `red:on`, ...).
        payload: String,
        /// Correlation id echoed in the `command_response`.
        request_id: String,
    },
    /// Probe one node's `network-info` view.
    ScanNode {
        /// Destination node address (link-local preferred).
        target_ipv6: String,
        /// Business name, for BR-side logging.
        node_name: String,
        /// Correlation id.
        request_id: String,
    },
    /// Probe every node the BR knows.
    ScanAllNodes {
        /// Correlation id.
        request_id: String,
    },
}

/// Why a command could not be enqueued.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The name is not in the inventory.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// No BR is known to front the node.
    #[error("no owning Border Router for node: {0}")]
    NoOwningBr(String),

    /// The owning BR exists but is not online.
    #[error("Border Router offline: {0}")]
    BrOffline(String),

    /// The BR has no live connection (or its queue is gone).
    #[error("Border Router not connected: {0}")]
    NotConnected(String),

    /// The command frame could not be serialized.
    #[error("command serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Route a node command through its owning BR.
///
/// Resolution: name → ML-EID via the inventory; owning BR via the
/// dynamic mapping first, the registry's declared-node index second.
/// Returns the minted request id on successful enqueue.
///
/// # Errors
///
/// See [`CommandError`] — each failure names the stage that failed.
pub fn send_command_to_node(
    ctx: &GatewayContext,
    node_name: &str,
    command_type: &str,
    payload: &str,
) -> Result<String, CommandError> {
    let target_ipv6 = ctx
        .resolver
        .address_for_name(node_name)
        .ok_or_else(|| CommandError::UnknownNode(node_name.to_string()))?;

    let br_id = ctx
        .mapping
        .br_for_node(node_name)
        .or_else(|| ctx.mapping.br_for_address(&target_ipv6))
        .or_else(|| ctx.registry.lookup_br_for_node(node_name))
        .ok_or_else(|| CommandError::NoOwningBr(node_name.to_string()))?;

    if !ctx.registry.is_online(&br_id) {
        return Err(CommandError::BrOffline(br_id));
    }

    let request_id = Uuid::new_v4().to_string();
    let frame = serde_json::to_string(&BrCommand::SendCoap {
        target_ipv6: target_ipv6.clone(),
        command_type: command_type.to_string(),
        payload: payload.to_string(),
        request_id: request_id.clone(),
    })?;

    if !session::enqueue_frame(ctx, &br_id, frame) {
        return Err(CommandError::NotConnected(br_id));
    }
    ctx.registry.increment_command_counter(&br_id);

    info!(
        node = node_name,
        target = %target_ipv6,
        br_id,
        command_type,
        request_id,
        "Command enqueued"
    );
    Ok(request_id)
}

/// Enqueue a `scan_node` probe on a specific BR.
///
/// # Errors
///
/// Returns [`CommandError::NotConnected`] when the BR has no live
/// connection.
pub fn send_scan_node(
    ctx: &GatewayContext,
    br_id: &str,
    target_ipv6: &str,
    node_name: &str,
) -> Result<String, CommandError> {
    let request_id = Uuid::new_v4().to_string();
    let frame = serde_json::to_string(&BrCommand::ScanNode {
        target_ipv6: target_ipv6.to_string(),
        node_name: node_name.to_string(),
        request_id: request_id.clone(),
    })?;

    if !session::enqueue_frame(ctx, br_id, frame) {
        warn!(br_id, node = node_name, "Scan not enqueued: BR not connected");
        return Err(CommandError::NotConnected(br_id.to_string()));
    }
    ctx.registry.increment_command_counter(br_id);

    info!(node = node_name, target = target_ipv6, br_id, request_id, "Scan enqueued");
    Ok(request_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing;
    use crate::session::BrConnection;
    use tokio::sync::mpsc;
    use trellis_registry::SessionId;

    /// Register BR-001 online with a captive outbound queue.
    fn connect_br(
        test: &testing::TestContext,
        br_id: &str,
        nodes: &[&str],
    ) -> mpsc::UnboundedReceiver<crate::session::Outbound> {
        let session = SessionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        test.ctx.registry.register(
            br_id,
            session,
            "fd78:8e78:3bfe:1::/64",
            nodes.iter().map(ToString::to_string).collect(),
        );
        test.ctx
            .connections
            .insert(br_id.to_string(), BrConnection {
                session,
                outbound: tx,
            });
        rx
    }

    fn next_frame(
        rx: &mut mpsc::UnboundedReceiver<crate::session::Outbound>,
    ) -> serde_json::Value {
        match rx.try_recv() {
            Ok(crate::session::Outbound::Frame(text)) => {
                serde_json::from_str(&text).expect("frame is JSON")
            },
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn command_routes_to_owning_br() {
        let test = testing::build();
        let mut rx = connect_br(&test, "BR-001", &["n01"]);

        let request_id =
            send_command_to_node(&test.ctx, "n01", "audio", "play:341").unwrap();

        let frame = next_frame(&mut rx);
        assert_eq!(frame["command"], "send_coap");
        assert_eq!(frame["target_ipv6"], "fd78:8e78:3bfe:1::abcd");
        assert_eq!(frame["command_type"], "audio");
        assert_eq!(frame["payload"], "play:341");
        assert_eq!(frame["request_id"], request_id.as_str());
        // The request id is a UUID.
        assert!(Uuid::parse_str(&request_id).is_ok());

        assert_eq!(test.ctx.registry.statistics().total_commands_sent, 1);
    }

    #[tokio::test]
    async fn command_prefers_dynamic_mapping() {
        let test = testing::build();
        // Registry says BR-001 declared n01, but traffic was last seen
        // via BR-002.
        let _rx1 = connect_br(&test, "BR-001", &["n01"]);
        let mut rx2 = connect_br(&test, "BR-002", &[]);
        test.ctx
            .mapping
            .update("fd78:8e78:3bfe:1::abcd", "n01", "BR-002");

        send_command_to_node(&test.ctx, "n01", "led", "red:on").unwrap();
        let frame = next_frame(&mut rx2);
        assert_eq!(frame["command_type"], "led");
    }

    #[tokio::test]
    async fn unknown_node_is_rejected() {
        let test = testing::build();
        assert!(matches!(
            send_command_to_node(&test.ctx, "n99", "led", "on"),
            Err(CommandError::UnknownNode(_))
        ));
    }

    #[tokio::test]
    async fn node_without_owner_is_rejected() {
        let test = testing::build();
        // n01 is in the inventory but no BR declared or saw it.
        assert!(matches!(
            send_command_to_node(&test.ctx, "n01", "led", "on"),
            Err(CommandError::NoOwningBr(_))
        ));
    }

    #[tokio::test]
    async fn offline_br_is_rejected() {
        let test = testing::build();
        // Mapping points at BR-002 which never registered.
        test.ctx
            .mapping
            .update("fd78:8e78:3bfe:1::abcd", "n01", "BR-002");
        assert!(matches!(
            send_command_to_node(&test.ctx, "n01", "led", "on"),
            Err(CommandError::BrOffline(_))
        ));
    }

    #[tokio::test]
    async fn scan_node_frame_shape() {
        let test = testing::build();
        let mut rx = connect_br(&test, "BR-001", &[]);

        send_scan_node(&test.ctx, "BR-001", "fe80::a8bb:ccff:fe00:1", "n05").unwrap();
        let frame = next_frame(&mut rx);
        assert_eq!(frame["command"], "scan_node");
        assert_eq!(frame["target_ipv6"], "fe80::a8bb:ccff:fe00:1");
        assert_eq!(frame["node_name"], "n05");
        assert!(frame["request_id"].as_str().is_some());
    }

    #[tokio::test]
    async fn scan_to_disconnected_br_fails() {
        let test = testing::build();
        assert!(matches!(
            send_scan_node(&test.ctx, "BR-009", "fe80::1", "n01"),
            Err(CommandError::NotConnected(_))
        ));
    }

    #[test]
    fn command_frames_roundtrip() {
        let cmd = BrCommand::ScanAllNodes {
            request_id: "r-1".into(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"command\":\"scan_all_nodes\""));
        let back: BrCommand = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, BrCommand::ScanAllNodes { .. }));
    }
}
