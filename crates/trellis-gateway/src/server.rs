//! WebSocket accept loop and per-session lifecycle.
//!
//! Accept phase: upgrade, pull `br_id`/`auth_token`/`network_prefix`
//! off the query string, authenticate against the credential store,
//! register the session, start the TX worker, confirm with a
//! `connected` frame. The accepting task then becomes the session's RX
//! loop; when the read side ends — cleanly or not — it falls through
//! to teardown.
//!
//! Only the listener bind is fatal; everything per-session is logged
//! and contained.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tracing::{debug, info, warn};
use trellis_core::epoch_secs;
use trellis_registry::SessionId;

use crate::context::GatewayContext;
use crate::error::GatewayError;
use crate::router;
use crate::session::{self, BrConnection, Outbound};

/// Query-string parameters of the upgrade request.
#[derive(Debug, Default)]
struct ConnectParams {
    br_id: String,
    auth_token: String,
    network_prefix: String,
}

impl ConnectParams {
    fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "br_id" => params.br_id = value.into_owned(),
                "auth_token" => params.auth_token = value.into_owned(),
                "network_prefix" => params.network_prefix = value.into_owned(),
                _ => {},
            }
        }
        params
    }
}

/// The BR-facing WebSocket listener.
pub struct GatewayServer {
    ctx: Arc<GatewayContext>,
    listener: TcpListener,
    shutdown: broadcast::Receiver<()>,
}

impl GatewayServer {
    /// Bind the listener at the configured address.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Bind`] when the address cannot be bound
    /// — the only fatal startup error besides credential loading.
    pub async fn bind(
        ctx: Arc<GatewayContext>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<Self, GatewayError> {
        let listener = TcpListener::bind(ctx.config.listen)
            .await
            .map_err(GatewayError::Bind)?;
        Ok(Self {
            ctx,
            listener,
            shutdown,
        })
    }

    /// The actually-bound address (relevant with port 0).
    ///
    /// # Errors
    ///
    /// Propagates the socket's `local_addr` error.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept sessions until shutdown.
    ///
    /// # Errors
    ///
    /// Infallible after a successful bind; the signature leaves room
    /// for listener-level failures to become fatal.
    pub async fn run(mut self) -> Result<(), GatewayError> {
        if let Ok(addr) = self.local_addr() {
            info!(%addr, "BR gateway listening");
        }
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.recv() => {
                    info!("BR gateway shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let ctx = Arc::clone(&self.ctx);
                            tokio::spawn(handle_connection(ctx, stream, peer));
                        },
                        Err(e) => {
                            warn!(error = %e, "Accept failed");
                        },
                    }
                }
            }
        }
    }
}

/// Send one error frame and close the socket.
async fn reject(mut ws: WebSocketStream<TcpStream>, message: &str) {
    let frame = serde_json::json!({ "type": "error", "message": message }).to_string();
    let _ = ws.send(Message::Text(frame.into())).await;
    let _ = ws.close(None).await;
}

/// One accepted TCP connection: handshake, auth, session lifecycle.
async fn handle_connection(ctx: Arc<GatewayContext>, stream: TcpStream, peer: SocketAddr) {
    let mut query: Option<String> = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        query = request.uri().query().map(ToString::to_string);
        Ok(response)
    };
    let ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "WebSocket handshake failed");
            return;
        },
    };

    let params = ConnectParams::from_query(query.as_deref().unwrap_or(""));
    info!(%peer, br_id = %params.br_id, "BR connection attempt");

    if params.br_id.is_empty() || params.auth_token.is_empty() {
        warn!(%peer, "Connection missing br_id or auth_token");
        reject(ws, "Missing br_id or auth_token").await;
        return;
    }
    if !ctx.credentials.verify(&params.br_id, &params.auth_token) {
        warn!(%peer, br_id = %params.br_id, "Authentication failed");
        reject(ws, "Authentication failed").await;
        return;
    }

    let br_id = params.br_id;
    let nodes = ctx.credentials.nodes_for(&br_id);
    let session = SessionId::new();

    // Supersede: stop the prior connection's TX worker before the new
    // mapping replaces it. The old RX loop will notice its dead socket
    // and run its (now stale, hence no-op) teardown.
    if let Some(old) = ctx.connections.get(&br_id) {
        debug!(br_id, old_session = %old.session, "Superseding prior connection");
        let _ = old.outbound.send(Outbound::Shutdown);
    }

    ctx.registry
        .register(&br_id, session, &params.network_prefix, nodes.clone());

    let (sink, mut rx_stream) = ws.split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    ctx.connections.insert(br_id.clone(), BrConnection {
        session,
        outbound: outbound_tx.clone(),
    });
    let worker = session::spawn_tx_worker(br_id.clone(), sink, outbound_rx);

    let connected = serde_json::json!({
        "type": "connected",
        "status": "ok",
        "br_id": br_id,
        "server_time": epoch_secs(),
        "nodes": nodes,
        "message": "Border Router connected successfully",
    });
    let _ = outbound_tx.send(Outbound::Frame(connected.to_string()));
    info!(br_id, %session, nodes = nodes.len(), "Border Router connected");

    // RX loop. Runs in this task until the stream ends.
    while let Some(message) = rx_stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                router::dispatch(&ctx, &br_id, text.as_str());
            },
            Ok(Message::Close(_)) => {
                info!(br_id, "BR closed connection");
                break;
            },
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_)) => {
                // Ping/pong handled by tungstenite; binary not spoken.
            },
            Err(e) => {
                warn!(br_id, error = %e, "RX loop error");
                break;
            },
        }
    }

    session::teardown(&ctx, &br_id, session, &outbound_tx, worker).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::send_command_to_node;
    use crate::context::testing;
    use futures::StreamExt;
    use std::time::Duration;
    use tokio_tungstenite::connect_async;

    async fn start_server(test: &testing::TestContext) -> (SocketAddr, broadcast::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server = GatewayServer::bind(Arc::clone(&test.ctx), shutdown_rx)
            .await
            .expect("bind");
        let addr = server.local_addr().expect("local addr");
        tokio::spawn(server.run());
        (addr, shutdown_tx)
    }

    async fn next_json(
        ws: &mut tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<TcpStream>,
        >,
    ) -> serde_json::Value {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(2), ws.next())
                .await
                .expect("timed out waiting for frame")
                .expect("stream ended")
                .expect("read error");
            if let Message::Text(text) = message {
                return serde_json::from_str(text.as_str()).expect("frame is JSON");
            }
        }
    }

    #[tokio::test]
    async fn auth_and_connect() {
        let test = testing::build_with(|c| {
            c.listen = "127.0.0.1:0".parse().expect("listen addr");
        });
        let (addr, _shutdown) = start_server(&test).await;

        let url = format!(
            "ws://{addr}/ws?br_id=BR-001&auth_token=GOOD&network_prefix=fd78:8e78:3bfe:1::/64"
        );
        let (mut ws, _) = connect_async(url).await.expect("connect");

        let connected = next_json(&mut ws).await;
        assert_eq!(connected["type"], "connected");
        assert_eq!(connected["status"], "ok");
        assert_eq!(connected["br_id"], "BR-001");
        assert!(connected["server_time"].as_f64().is_some());
        assert_eq!(connected["nodes"], serde_json::json!(["n01", "n07"]));

        assert!(test.ctx.registry.is_online("BR-001"));
        let snapshot = test.ctx.registry.snapshot();
        assert_eq!(snapshot[0].events_received, 0);
        assert_eq!(snapshot[0].network_prefix, "fd78:8e78:3bfe:1::/64");
    }

    #[tokio::test]
    async fn auth_failure_closes_without_registering() {
        let test = testing::build_with(|c| {
            c.listen = "127.0.0.1:0".parse().expect("listen addr");
        });
        let (addr, _shutdown) = start_server(&test).await;

        let url = format!("ws://{addr}/ws?br_id=BR-001&auth_token=BAD");
        let (mut ws, _) = connect_async(url).await.expect("connect");

        let error = next_json(&mut ws).await;
        assert_eq!(error["type"], "error");
        assert_eq!(error["message"], "Authentication failed");

        // The server closes; the stream ends.
        let end = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match ws.next().await {
                    None | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {},
                    Some(Err(_)) => break,
                }
            }
        })
        .await;
        assert!(end.is_ok());

        assert!(!test.ctx.registry.is_online("BR-001"));
        assert!(test.ctx.registry.snapshot().is_empty());
    }

    #[tokio::test]
    async fn missing_params_are_rejected() {
        let test = testing::build_with(|c| {
            c.listen = "127.0.0.1:0".parse().expect("listen addr");
        });
        let (addr, _shutdown) = start_server(&test).await;

        let url = format!("ws://{addr}/ws?br_id=BR-001");
        let (mut ws, _) = connect_async(url).await.expect("connect");
        let error = next_json(&mut ws).await;
        assert_eq!(error["message"], "Missing br_id or auth_token");
    }

    #[tokio::test]
    async fn heartbeat_round_trip_over_socket() {
        let test = testing::build_with(|c| {
            c.listen = "127.0.0.1:0".parse().expect("listen addr");
        });
        let (addr, _shutdown) = start_server(&test).await;

        let url = format!("ws://{addr}/ws?br_id=BR-001&auth_token=GOOD");
        let (mut ws, _) = connect_async(url).await.expect("connect");
        let _connected = next_json(&mut ws).await;

        ws.send(Message::Text(
            r#"{"type":"heartbeat","nodes_count":2,"status":"ok"}"#.into(),
        ))
        .await
        .expect("send heartbeat");

        let ack = next_json(&mut ws).await;
        assert_eq!(ack["type"], "heartbeat_ack");
        assert_eq!(ack["server_status"], "ok");
    }

    #[tokio::test]
    async fn commands_reach_the_socket_in_order() {
        let test = testing::build_with(|c| {
            c.listen = "127.0.0.1:0".parse().expect("listen addr");
        });
        let (addr, _shutdown) = start_server(&test).await;

        let url = format!("ws://{addr}/ws?br_id=BR-001&auth_token=GOOD");
        let (mut ws, _) = connect_async(url).await.expect("connect");
        let _connected = next_json(&mut ws).await;

        let first = send_command_to_node(&test.ctx, "n01", "audio", "play:341").expect("enqueue");
        let second = send_command_to_node(&test.ctx, "n01", "led", "red:on").expect("enqueue");

        let frame1 = next_json(&mut ws).await;
        assert_eq!(frame1["command"], "send_coap");
        assert_eq!(frame1["target_ipv6"], "fd78:8e78:3bfe:1::abcd");
        assert_eq!(frame1["command_type"], "audio");
        assert_eq!(frame1["payload"], "play:341");
        assert_eq!(frame1["request_id"], first.as_str());

        let frame2 = next_json(&mut ws).await;
        assert_eq!(frame2["command_type"], "led");
        assert_eq!(frame2["request_id"], second.as_str());
    }

    #[tokio::test]
    async fn disconnect_tears_down_session() {
        let test = testing::build_with(|c| {
            c.listen = "127.0.0.1:0".parse().expect("listen addr");
        });
        let (addr, _shutdown) = start_server(&test).await;

        let url = format!("ws://{addr}/ws?br_id=BR-001&auth_token=GOOD");
        let (mut ws, _) = connect_async(url).await.expect("connect");
        let _connected = next_json(&mut ws).await;
        assert!(test.ctx.registry.is_online("BR-001"));

        ws.close(None).await.expect("close");

        // Teardown flips the record offline and drops the connection.
        let deadline = tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                if !test.ctx.registry.is_online("BR-001")
                    && !test.ctx.connections.contains_key("BR-001")
                {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(deadline.is_ok(), "session was not torn down");

        let snapshot = test.ctx.registry.snapshot();
        assert!(snapshot[0].disconnected_at.is_some());
    }

    #[tokio::test]
    async fn reconnect_supersedes_prior_socket() {
        let test = testing::build_with(|c| {
            c.listen = "127.0.0.1:0".parse().expect("listen addr");
        });
        let (addr, _shutdown) = start_server(&test).await;
        let url = format!("ws://{addr}/ws?br_id=BR-001&auth_token=GOOD");

        let (mut first, _) = connect_async(&url).await.expect("connect");
        let _ = next_json(&mut first).await;
        let first_session = test.ctx.registry.session_for("BR-001").expect("session");

        let (mut second, _) = connect_async(&url).await.expect("reconnect");
        let _ = next_json(&mut second).await;

        // New session took over; commands land on the new socket.
        let new_session = test.ctx.registry.session_for("BR-001").expect("session");
        assert_ne!(first_session, new_session);
        assert!(test.ctx.registry.is_online("BR-001"));

        send_command_to_node(&test.ctx, "n01", "led", "red:on").expect("enqueue");
        let frame = next_json(&mut second).await;
        assert_eq!(frame["command_type"], "led");
    }
}
