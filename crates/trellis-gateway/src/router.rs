//! Inbound message router.
//!
//! Every text frame from a BR lands here. Frames are JSON objects with
//! a `type` field; anything malformed or unknown is logged and dropped
//! — a bad frame never tears a session down.

use serde_json::Value;
use tracing::{debug, info, warn};
use trellis_core::epoch_secs;
use trellis_events::MeshEvent;
use trellis_topology::{ChildLinkSample, DiagnosticNode, RouterLinkSample};

use crate::commands::send_scan_node;
use crate::context::GatewayContext;
use crate::resolver::NameResolver;
use crate::scan::{self, NetworkInfo};
use crate::session::enqueue_frame;

/// Route one inbound frame from `br_id`.
pub(crate) fn dispatch(ctx: &GatewayContext, br_id: &str, text: &str) {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(br_id, error = %e, "Invalid JSON frame discarded");
            return;
        },
    };
    let Some(msg_type) = value.get("type").and_then(Value::as_str) else {
        warn!(br_id, "Frame without type field discarded");
        return;
    };

    debug!(br_id, msg_type, bytes = text.len(), "Frame received");

    match msg_type {
        "heartbeat" => handle_heartbeat(ctx, br_id, &value),
        "node_event" => handle_node_event(ctx, br_id, &value),
        "node_discovered" => handle_node_discovered(ctx, br_id, &value),
        "command_response" => handle_command_response(ctx, br_id, &value),
        "topology_update" => handle_topology_update(ctx, br_id, &value),
        "scan_node_result" => handle_scan_node_result(ctx, br_id, &value),
        "diagnostic_node" => handle_diagnostic_node(ctx, br_id, &value),
        "diagnostic_link" => handle_diagnostic_link(ctx, br_id, &value),
        "diagnostic_child" => handle_diagnostic_child(ctx, br_id, &value),
        other => {
            warn!(br_id, msg_type = other, "Unknown message type discarded");
        },
    }
}

/// Refresh liveness and ack. A heartbeat from a BR without a record
/// (first contact, e.g. after a coordinator restart) auto-registers it
/// with an empty node list; config reload fills the rest in later.
fn handle_heartbeat(ctx: &GatewayContext, br_id: &str, value: &Value) {
    let nodes_count = value
        .get("nodes_count")
        .and_then(Value::as_u64)
        .map(|n| usize::try_from(n).unwrap_or(usize::MAX));

    if !ctx.registry.update_heartbeat(br_id, nodes_count) {
        if let Some(conn) = ctx.connections.get(br_id) {
            info!(br_id, "First-contact heartbeat; auto-registering");
            let prefix = ctx.credentials.network_prefix_for(br_id);
            ctx.registry
                .register(br_id, conn.session, &prefix, Vec::new());
            ctx.registry.update_heartbeat(br_id, nodes_count);
        }
    }

    let ack = serde_json::json!({
        "type": "heartbeat_ack",
        "timestamp": epoch_secs(),
        "server_status": "ok",
    });
    enqueue_frame(ctx, br_id, ack.to_string());
}

/// Enrich and fan out a node event; first sight of an address also
/// broadcasts a `node_update` and kicks an opportunistic scan.
fn handle_node_event(ctx: &GatewayContext, br_id: &str, value: &Value) {
    let Some(source_ipv6) = value.get("source_ipv6").and_then(Value::as_str) else {
        warn!(br_id, "node_event without source_ipv6 discarded");
        return;
    };
    let Some(event_type) = value.get("event_type").and_then(Value::as_str) else {
        warn!(br_id, "node_event without event_type discarded");
        return;
    };
    let payload = value.get("payload").cloned().unwrap_or(Value::Null);

    let is_new = !ctx.mapping.contains(source_ipv6);
    let node_name = ctx
        .resolver
        .name_for_ipv6(source_ipv6)
        .unwrap_or_else(|| {
            warn!(br_id, ipv6 = source_ipv6, event_type, "Event from unknown node");
            NameResolver::synthesized_name(source_ipv6)
        });
    ctx.mapping.update(source_ipv6, &node_name, br_id);

    if is_new {
        info!(node = %node_name, ipv6 = source_ipv6, br_id, "New active node");
        ctx.bus.publish(MeshEvent::NodeUpdate {
            node_name: node_name.clone(),
            ipv6: source_ipv6.to_string(),
            br_id: br_id.to_string(),
            timestamp: epoch_secs(),
        });
        // Opportunistic scan: let the reporting BR pull the newcomer's
        // network view; the neighbor walk fans out from there.
        if let Err(e) = send_scan_node(ctx, br_id, source_ipv6, &node_name) {
            debug!(br_id, error = %e, "Opportunistic scan not enqueued");
        }
    }

    ctx.registry.increment_event_counter(br_id);

    ctx.bus.publish(MeshEvent::NodeEvent {
        node: node_name,
        br_id: br_id.to_string(),
        ipv6: source_ipv6.to_string(),
        event_type: event_type.to_string(),
        payload,
        timestamp: epoch_secs(),
    });
}

fn handle_node_discovered(ctx: &GatewayContext, br_id: &str, value: &Value) {
    let Some(source_ipv6) = value.get("source_ipv6").and_then(Value::as_str) else {
        warn!(br_id, "node_discovered without source_ipv6 discarded");
        return;
    };

    let node_name = ctx
        .resolver
        .name_for_ipv6(source_ipv6)
        .unwrap_or_else(|| NameResolver::synthesized_name(source_ipv6));
    ctx.mapping.update(source_ipv6, &node_name, br_id);

    info!(node = %node_name, ipv6 = source_ipv6, br_id, "Node discovered");
    ctx.bus.publish(MeshEvent::NodeDiscovered {
        node_name,
        ipv6: source_ipv6.to_string(),
        br_id: br_id.to_string(),
        timestamp: epoch_secs(),
    });
}

fn handle_command_response(ctx: &GatewayContext, br_id: &str, value: &Value) {
    let Some(request_id) = value.get("request_id").and_then(Value::as_str) else {
        warn!(br_id, "command_response without request_id discarded");
        return;
    };

    let status = value
        .get("status")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    info!(br_id, request_id, status = status.as_deref(), "Command response");

    ctx.bus.publish(MeshEvent::CommandCompleted {
        request_id: request_id.to_string(),
        node: value.get("node").and_then(Value::as_str).map(ToString::to_string),
        br_id: br_id.to_string(),
        status,
        result: value.get("result").cloned().unwrap_or(Value::Null),
        error: value
            .get("error")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        timestamp: epoch_secs(),
    });
}

/// Replace the BR's declared node list from its topology report.
fn handle_topology_update(ctx: &GatewayContext, br_id: &str, value: &Value) {
    let names: Vec<String> = value
        .get("nodes")
        .and_then(Value::as_array)
        .map(|nodes| {
            nodes
                .iter()
                .filter_map(|node| node.get("name").and_then(Value::as_str))
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default();

    let nodes_count = names.len();
    ctx.registry.update_nodes_list(br_id, names);

    ctx.bus.publish(MeshEvent::TopologyUpdate {
        br_id: br_id.to_string(),
        nodes_count,
        timestamp: epoch_secs(),
    });
}

fn handle_scan_node_result(ctx: &GatewayContext, br_id: &str, value: &Value) {
    let success = value
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !success {
        warn!(
            br_id,
            node = value.get("node_name").and_then(serde_json::Value::as_str),
            error = value.get("error").and_then(serde_json::Value::as_str),
            "Node scan failed"
        );
        return;
    }

    let network_info = value.get("network_info").cloned().unwrap_or(Value::Null);
    let view: NetworkInfo = match serde_json::from_value(network_info.clone()) {
        Ok(view) => view,
        Err(e) => {
            warn!(br_id, error = %e, "Unparseable network_info discarded");
            return;
        },
    };

    scan::ingest_scan_result(ctx, br_id, &view, Some(br_id));

    ctx.bus.publish(MeshEvent::ScanNodeResult {
        br_id: br_id.to_string(),
        node_name: value
            .get("node_name")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        target_ipv6: value
            .get("target_ipv6")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        request_id: value
            .get("request_id")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        success,
        network_info,
        timestamp: epoch_secs(),
    });
}

/// Aggregate a diagnostic node observation and enrich it with a
/// business name resolved from its ML-EIDs.
fn handle_diagnostic_node(ctx: &GatewayContext, br_id: &str, value: &Value) {
    let sample: DiagnosticNode = match serde_json::from_value(value.clone()) {
        Ok(sample) => sample,
        Err(e) => {
            warn!(br_id, error = %e, "Unparseable diagnostic_node discarded");
            return;
        },
    };

    let Some(record) = ctx.topology.upsert_node(&sample, br_id) else {
        debug!(br_id, "diagnostic_node lacked identity; dropped");
        return;
    };

    let node_name = ctx.resolver.name_from_mleids(&record.mleids);
    if let Some(name) = &node_name {
        for mleid in &record.mleids {
            ctx.mapping.update(mleid, name, br_id);
        }
    }

    ctx.bus.publish(MeshEvent::DiagnosticNode {
        br_id: br_id.to_string(),
        node_name,
        partition: record.partition_id,
        ext_addr: record.ext_addr.to_string(),
        timestamp: epoch_secs(),
    });
}

fn handle_diagnostic_link(ctx: &GatewayContext, br_id: &str, value: &Value) {
    let sample: RouterLinkSample = match serde_json::from_value(value.clone()) {
        Ok(sample) => sample,
        Err(e) => {
            warn!(br_id, error = %e, "Unparseable diagnostic_link discarded");
            return;
        },
    };

    let Some((a, b)) = ctx.topology.upsert_router_link(&sample) else {
        debug!(br_id, "diagnostic_link lacked endpoints; dropped");
        return;
    };

    ctx.bus.publish(MeshEvent::DiagnosticLink {
        br_id: br_id.to_string(),
        a_rloc16: a.to_string(),
        b_rloc16: b.to_string(),
        timestamp: epoch_secs(),
    });
}

fn handle_diagnostic_child(ctx: &GatewayContext, br_id: &str, value: &Value) {
    let sample: ChildLinkSample = match serde_json::from_value(value.clone()) {
        Ok(sample) => sample,
        Err(e) => {
            warn!(br_id, error = %e, "Unparseable diagnostic_child discarded");
            return;
        },
    };

    let Some((parent, child)) = ctx.topology.upsert_child_link(&sample, br_id) else {
        debug!(br_id, "diagnostic_child lacked endpoints; dropped");
        return;
    };

    ctx.bus.publish(MeshEvent::DiagnosticChild {
        br_id: br_id.to_string(),
        parent_rloc16: parent.to_string(),
        child_rloc16: child.to_string(),
        timestamp: epoch_secs(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing;
    use crate::session::{BrConnection, Outbound};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use trellis_events::EventReceiver;
    use trellis_registry::SessionId;

    struct Harness {
        test: testing::TestContext,
        outbound_rx: mpsc::UnboundedReceiver<Outbound>,
        events: EventReceiver,
    }

    /// Context with BR-001 connected and registered, all channels tapped.
    fn harness() -> Harness {
        let test = testing::build();
        let session = SessionId::new();
        let (tx, outbound_rx) = mpsc::unbounded_channel();
        test.ctx.registry.register(
            "BR-001",
            session,
            "fd78:8e78:3bfe:1::/64",
            vec!["n01".into(), "n07".into()],
        );
        test.ctx
            .connections
            .insert("BR-001".to_string(), BrConnection {
                session,
                outbound: tx,
            });
        let events = test.ctx.bus.subscribe();
        Harness {
            test,
            outbound_rx,
            events,
        }
    }

    fn drain_frames(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(Outbound::Frame(text)) = rx.try_recv() {
            frames.push(serde_json::from_str(&text).expect("frame is JSON"));
        }
        frames
    }

    fn drain_events(events: &mut EventReceiver) -> Vec<Arc<MeshEvent>> {
        let mut out = Vec::new();
        while let Some(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn malformed_frames_are_discarded_quietly() {
        let mut h = harness();
        dispatch(&h.test.ctx, "BR-001", "{ not json");
        dispatch(&h.test.ctx, "BR-001", r#"{"no_type": true}"#);
        dispatch(&h.test.ctx, "BR-001", r#"{"type": "launch_missiles"}"#);

        assert!(drain_frames(&mut h.outbound_rx).is_empty());
        assert!(drain_events(&mut h.events).is_empty());
        // Session untouched.
        assert!(h.test.ctx.registry.is_online("BR-001"));
    }

    #[tokio::test]
    async fn heartbeat_acks_and_counts() {
        let mut h = harness();
        dispatch(
            &h.test.ctx,
            "BR-001",
            r#"{"type": "heartbeat", "nodes_count": 5, "status": "ok"}"#,
        );

        let frames = drain_frames(&mut h.outbound_rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "heartbeat_ack");
        assert_eq!(frames[0]["server_status"], "ok");

        let snapshot = h.test.ctx.registry.snapshot();
        let br = snapshot.iter().find(|s| s.br_id == "BR-001").unwrap();
        assert_eq!(br.heartbeat_count, 1);
        assert_eq!(br.nodes_count, 5);
    }

    #[tokio::test]
    async fn heartbeat_from_unknown_br_auto_registers() {
        let h = harness();
        // BR-002 connects but never registered (coordinator restarted).
        let session = SessionId::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        h.test
            .ctx
            .connections
            .insert("BR-002".to_string(), BrConnection {
                session,
                outbound: tx,
            });

        dispatch(&h.test.ctx, "BR-002", r#"{"type": "heartbeat"}"#);

        assert!(h.test.ctx.registry.is_online("BR-002"));
        let frames = drain_frames(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "heartbeat_ack");
    }

    #[tokio::test]
    async fn node_event_enriches_and_broadcasts_once() {
        let mut h = harness();
        let frame = r#"{"type": "node_event",
                        "source_ipv6": "fd78:8e78:3bfe:1::abcd",
                        "event_type": "button",
                        "payload": {"pressed": true}}"#;

        dispatch(&h.test.ctx, "BR-001", frame);

        let events = drain_events(&mut h.events);
        let channels: Vec<&str> = events.iter().map(|e| e.channel()).collect();
        // First sight: node_update then node_event.
        assert_eq!(channels, ["node_update", "node_event"]);
        match events[1].as_ref() {
            MeshEvent::NodeEvent { node, payload, .. } => {
                assert_eq!(node, "n01");
                assert_eq!(payload["pressed"], true);
            },
            other => panic!("wrong event: {other:?}"),
        }

        // First sight also kicks an opportunistic scan at the source.
        let frames = drain_frames(&mut h.outbound_rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["command"], "scan_node");
        assert_eq!(frames[0]["target_ipv6"], "fd78:8e78:3bfe:1::abcd");

        // Second event from the same address: no second node_update,
        // no second scan.
        dispatch(&h.test.ctx, "BR-001", frame);
        let channels: Vec<&str> = drain_events(&mut h.events)
            .iter()
            .map(|e| e.channel())
            .collect();
        assert_eq!(channels, ["node_event"]);
        assert!(drain_frames(&mut h.outbound_rx).is_empty());

        let stats = h.test.ctx.registry.statistics();
        assert_eq!(stats.total_events_received, 2);
    }

    #[tokio::test]
    async fn node_event_from_unknown_address_synthesizes_name() {
        let mut h = harness();
        dispatch(
            &h.test.ctx,
            "BR-001",
            r#"{"type": "node_event", "source_ipv6": "fd00::bad:cafe",
                "event_type": "battery", "payload": {"voltage_mv": 2900}}"#,
        );

        let events = drain_events(&mut h.events);
        match events[1].as_ref() {
            MeshEvent::NodeEvent { node, .. } => {
                assert_eq!(node, "unknown-bad:cafe");
            },
            other => panic!("wrong event: {other:?}"),
        }
        // The synthesized name is recorded in the dynamic mapping.
        assert_eq!(
            h.test.ctx.mapping.name_for("fd00::bad:cafe"),
            Some("unknown-bad:cafe".to_string())
        );
    }

    #[tokio::test]
    async fn rloc_source_back_resolves_through_topology() {
        let mut h = harness();
        // Topology knows the node holding 0xc400 by n07's ML-EID.
        h.test.ctx.topology.upsert_node(
            &DiagnosticNode {
                partition: Some(0x1a2b),
                ext_addr: Some("0123456789abcdef".into()),
                rloc16: Some("0xc400".into()),
                mleids: vec!["fd78:8e78:3bfe:1::7777".into()],
                ..DiagnosticNode::default()
            },
            "BR-001",
        );

        dispatch(
            &h.test.ctx,
            "BR-001",
            r#"{"type": "node_event",
                "source_ipv6": "fdc7:4097:c896:f63b:0:ff:fe00:c400",
                "event_type": "button", "payload": {}}"#,
        );

        let events = drain_events(&mut h.events);
        match events[1].as_ref() {
            MeshEvent::NodeEvent { node, .. } => assert_eq!(node, "n07"),
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn node_discovered_broadcasts() {
        let mut h = harness();
        dispatch(
            &h.test.ctx,
            "BR-001",
            r#"{"type": "node_discovered", "source_ipv6": "fd78:8e78:3bfe:1::7777"}"#,
        );
        let events = drain_events(&mut h.events);
        assert_eq!(events.len(), 1);
        match events[0].as_ref() {
            MeshEvent::NodeDiscovered { node_name, .. } => assert_eq!(node_name, "n07"),
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn command_response_correlates_by_request_id() {
        let mut h = harness();
        dispatch(
            &h.test.ctx,
            "BR-001",
            r#"{"type": "command_response", "request_id": "req-42",
                "node": "n01", "status": "ok", "result": {"played": true}}"#,
        );
        let events = drain_events(&mut h.events);
        match events[0].as_ref() {
            MeshEvent::CommandCompleted {
                request_id,
                status,
                result,
                error,
                ..
            } => {
                assert_eq!(request_id, "req-42");
                assert_eq!(status.as_deref(), Some("ok"));
                assert_eq!(result["played"], true);
                assert!(error.is_none());
            },
            other => panic!("wrong event: {other:?}"),
        }

        // Without a request id there is nothing to correlate.
        dispatch(
            &h.test.ctx,
            "BR-001",
            r#"{"type": "command_response", "status": "ok"}"#,
        );
        assert!(drain_events(&mut h.events).is_empty());
    }

    #[tokio::test]
    async fn topology_update_replaces_declared_nodes() {
        let mut h = harness();
        dispatch(
            &h.test.ctx,
            "BR-001",
            r#"{"type": "topology_update",
                "nodes": [{"name": "n07"}, {"name": "n08"}, {"noname": 1}]}"#,
        );

        assert_eq!(h.test.ctx.registry.lookup_br_for_node("n01"), None);
        assert_eq!(
            h.test.ctx.registry.lookup_br_for_node("n08"),
            Some("BR-001".to_string())
        );
        match drain_events(&mut h.events)[0].as_ref() {
            MeshEvent::TopologyUpdate { nodes_count, .. } => assert_eq!(*nodes_count, 2),
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn scan_result_ingests_and_walks() {
        let mut h = harness();
        dispatch(
            &h.test.ctx,
            "BR-001",
            r#"{"type": "scan_node_result", "request_id": "req-7",
                "node_name": "n01", "target_ipv6": "fd78:8e78:3bfe:1::abcd",
                "success": true,
                "network_info": {
                    "rloc16": "0xc400", "role": "router",
                    "partition": 6699, "ext_addr": "0123456789abcdef",
                    "neighbors": [{"rloc16": "0xc800",
                                   "ext_addr": "1122334455667788",
                                   "avg_rssi": -66}],
                    "children": []
                }}"#,
        );

        // Topology has the node and its router link.
        let snapshot = h.test.ctx.topology.snapshot();
        assert_eq!(snapshot.stats.total_nodes, 1);
        assert_eq!(snapshot.stats.total_router_links, 1);

        // The neighbor got a follow-up scan at its link-local address.
        let frames = drain_frames(&mut h.outbound_rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["target_ipv6"], "fe80::1322:3344:5566:7788");

        match drain_events(&mut h.events)[0].as_ref() {
            MeshEvent::ScanNodeResult {
                success, request_id, ..
            } => {
                assert!(success);
                assert_eq!(request_id.as_deref(), Some("req-7"));
            },
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_scan_result_is_dropped() {
        let mut h = harness();
        dispatch(
            &h.test.ctx,
            "BR-001",
            r#"{"type": "scan_node_result", "success": false, "error": "timeout"}"#,
        );
        assert!(drain_events(&mut h.events).is_empty());
        assert_eq!(h.test.ctx.topology.snapshot().stats.total_nodes, 0);
    }

    #[tokio::test]
    async fn diagnostic_node_aggregates_across_brs() {
        let mut h = harness();
        dispatch(
            &h.test.ctx,
            "BR-001",
            r#"{"type": "diagnostic_node", "partition": 6699,
                "ext_addr": "0123456789abcdef", "rloc16": "0xc400"}"#,
        );
        dispatch(
            &h.test.ctx,
            "BR-002",
            r#"{"type": "diagnostic_node", "partition": 6699,
                "ext_addr": "0123456789abcdef", "rloc16": "0xc800"}"#,
        );

        let snapshot = h.test.ctx.topology.snapshot();
        assert_eq!(snapshot.stats.total_nodes, 1);
        let node = &snapshot.nodes[0];
        assert_eq!(node.rloc16s.len(), 2);
        assert_eq!(node.br_ids.len(), 2);

        let events = drain_events(&mut h.events);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.channel() == "diagnostic_node"));
    }

    #[tokio::test]
    async fn diagnostic_node_resolves_name_from_mleids() {
        let mut h = harness();
        dispatch(
            &h.test.ctx,
            "BR-001",
            r#"{"type": "diagnostic_node", "partition": 1,
                "ext_addr": "0123456789abcdef",
                "mleids": ["fd78:8e78:3bfe:1::abcd"]}"#,
        );

        match drain_events(&mut h.events)[0].as_ref() {
            MeshEvent::DiagnosticNode { node_name, .. } => {
                assert_eq!(node_name.as_deref(), Some("n01"));
            },
            other => panic!("wrong event: {other:?}"),
        }
        // Back-resolution is recorded in the dynamic mapping too.
        assert_eq!(
            h.test.ctx.mapping.name_for("fd78:8e78:3bfe:1::abcd"),
            Some("n01".to_string())
        );
    }

    #[tokio::test]
    async fn diagnostic_link_and_child_broadcast() {
        let mut h = harness();
        dispatch(
            &h.test.ctx,
            "BR-001",
            r#"{"type": "diagnostic_link", "a_rloc16": "0xc800",
                "b_rloc16": "0xc400", "avg_rssi": -70}"#,
        );
        dispatch(
            &h.test.ctx,
            "BR-001",
            r#"{"type": "diagnostic_child", "parent_rloc16": "0xc400",
                "child_rloc16": "0xc401", "mode": "sed"}"#,
        );

        let events = drain_events(&mut h.events);
        match events[0].as_ref() {
            MeshEvent::DiagnosticLink { a_rloc16, b_rloc16, .. } => {
                // Endpoints normalized to sorted order.
                assert_eq!(a_rloc16, "0xc400");
                assert_eq!(b_rloc16, "0xc800");
            },
            other => panic!("wrong event: {other:?}"),
        }
        match events[1].as_ref() {
            MeshEvent::DiagnosticChild { parent_rloc16, child_rloc16, .. } => {
                assert_eq!(parent_rloc16, "0xc400");
                assert_eq!(child_rloc16, "0xc401");
            },
            other => panic!("wrong event: {other:?}"),
        }

        // Incomplete samples are dropped without an event.
        dispatch(
            &h.test.ctx,
            "BR-001",
            r#"{"type": "diagnostic_link", "a_rloc16": "0xc800"}"#,
        );
        assert!(drain_events(&mut h.events).is_empty());
    }
}
