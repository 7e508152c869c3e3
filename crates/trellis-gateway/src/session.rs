//! Per-session outbound plumbing: the TX queue, the TX worker, and
//! teardown.
//!
//! Every accepted BR gets one unbounded outbound queue and one TX
//! worker that owns the socket's write half. All writes (acks,
//! commands, scan requests) go through the queue, so frame order is
//! the enqueue order and nothing else ever touches the sink.
//!
//! Teardown pushes a sentinel rather than closing the socket first:
//! closing first would race in-flight enqueues, the sentinel drains
//! them.

use std::time::Duration;

use futures::SinkExt;
use futures::stream::SplitSink;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use trellis_registry::SessionId;

use crate::context::GatewayContext;

/// How long teardown waits for the TX worker to drain and exit.
const TX_JOIN_DEADLINE: Duration = Duration::from_secs(2);

pub(crate) type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// An item on a session's outbound queue.
#[derive(Debug)]
pub(crate) enum Outbound {
    /// A JSON text frame to send verbatim.
    Frame(String),
    /// Shutdown sentinel: the TX worker exits after seeing this.
    Shutdown,
}

/// One live BR connection: its session id and outbound queue.
pub struct BrConnection {
    /// Session id minted at accept time.
    pub session: SessionId,
    pub(crate) outbound: mpsc::UnboundedSender<Outbound>,
}

/// Enqueue a text frame for a connected BR.
///
/// Success means enqueued, not delivered. Returns `false` when the BR
/// has no live connection (or its queue is gone).
pub(crate) fn enqueue_frame(ctx: &GatewayContext, br_id: &str, frame: String) -> bool {
    let Some(conn) = ctx.connections.get(br_id) else {
        warn!(br_id, "Cannot enqueue frame: BR not connected");
        return false;
    };
    conn.outbound.send(Outbound::Frame(frame)).is_ok()
}

/// Spawn the TX worker owning the socket's write half.
///
/// A write failure is logged and the worker keeps draining — the RX
/// loop notices a dead socket and triggers teardown.
pub(crate) fn spawn_tx_worker(
    br_id: String,
    mut sink: WsSink,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(br_id, "TX worker started");
        loop {
            match outbound_rx.recv().await {
                Some(Outbound::Frame(text)) => {
                    let bytes = text.len();
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        error!(br_id, error = %e, "TX worker send failed");
                    } else {
                        debug!(br_id, bytes, "Frame sent");
                    }
                },
                Some(Outbound::Shutdown) | None => break,
            }
        }
        debug!(br_id, "TX worker stopped");
    })
}

/// Tear a session down. Idempotent.
///
/// Pushes the shutdown sentinel, waits up to 2 s for the TX worker to
/// drain, then releases the registry record and connection-table entry.
/// The entry is removed only when the session id still matches, so
/// teardown of a superseded session cannot disturb its successor.
pub(crate) async fn teardown(
    ctx: &GatewayContext,
    br_id: &str,
    session: SessionId,
    outbound_tx: &mpsc::UnboundedSender<Outbound>,
    mut worker: JoinHandle<()>,
) {
    let _ = outbound_tx.send(Outbound::Shutdown);

    if tokio::time::timeout(TX_JOIN_DEADLINE, &mut worker).await.is_err() {
        warn!(br_id, "TX worker did not stop in time; releasing session anyway");
        worker.abort();
    }

    ctx.registry.unregister(br_id, session);
    ctx.connections
        .remove_if(br_id, |_, conn| conn.session == session);
    info!(br_id, %session, "Session torn down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing;

    #[tokio::test]
    async fn enqueue_to_unknown_br_fails() {
        let test = testing::build();
        assert!(!enqueue_frame(&test.ctx, "BR-404", "{}".to_string()));
    }

    #[tokio::test]
    async fn enqueue_preserves_fifo_order() {
        let test = testing::build();
        let (tx, mut rx) = mpsc::unbounded_channel();
        test.ctx.connections.insert(
            "BR-001".to_string(),
            BrConnection {
                session: SessionId::new(),
                outbound: tx,
            },
        );

        for i in 0..10 {
            assert!(enqueue_frame(&test.ctx, "BR-001", format!("m{i}")));
        }
        for i in 0..10 {
            match rx.recv().await {
                Some(Outbound::Frame(text)) => assert_eq!(text, format!("m{i}")),
                other => panic!("expected frame, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn teardown_is_idempotent_and_releases_state() {
        let test = testing::build();
        let session = SessionId::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        test.ctx
            .registry
            .register("BR-001", session, "fd78::/64", vec!["n01".into()]);
        test.ctx.connections.insert(
            "BR-001".to_string(),
            BrConnection {
                session,
                outbound: tx.clone(),
            },
        );

        // Stand-in TX worker that drains until the sentinel.
        let worker = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Some(Outbound::Shutdown) | None => break,
                    Some(Outbound::Frame(_)) => {},
                }
            }
        });

        teardown(&test.ctx, "BR-001", session, &tx, worker).await;
        assert!(!test.ctx.registry.is_online("BR-001"));
        assert!(!test.ctx.connections.contains_key("BR-001"));

        // Second teardown with a finished worker: a no-op.
        let worker2 = tokio::spawn(async {});
        teardown(&test.ctx, "BR-001", session, &tx, worker2).await;
        assert!(!test.ctx.connections.contains_key("BR-001"));
    }

    #[tokio::test]
    async fn stale_teardown_leaves_successor_alone() {
        let test = testing::build();
        let old_session = SessionId::new();
        let new_session = SessionId::new();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, _new_rx) = mpsc::unbounded_channel();

        // New session has already superseded the old one.
        test.ctx
            .registry
            .register("BR-001", new_session, "", vec!["n01".into()]);
        test.ctx.connections.insert(
            "BR-001".to_string(),
            BrConnection {
                session: new_session,
                outbound: new_tx,
            },
        );

        let worker = tokio::spawn(async {});
        teardown(&test.ctx, "BR-001", old_session, &old_tx, worker).await;

        // Successor untouched.
        assert!(test.ctx.registry.is_online("BR-001"));
        assert!(test.ctx.connections.contains_key("BR-001"));
    }
}
