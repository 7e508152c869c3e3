//! One-shot CoAP client over UDP/IPv6.
//!
//! Opens a fresh socket per call, sends a single datagram, and — for
//! GETs — waits up to a per-call timeout for a 2.xx reply. There is no
//! retransmission at this layer.

use std::net::Ipv6Addr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, trace};

use crate::codec::{self, COAP_PORT};
use crate::error::CoapError;

/// Default per-call reply timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Reply buffer size.
const RECV_BUFFER: usize = 4096;

/// One-shot CoAP client for direct node probes.
#[derive(Debug, Clone)]
pub struct CoapClient {
    port: u16,
    timeout: Duration,
}

impl CoapClient {
    /// Client with the default port (5683) and reply timeout (2 s).
    #[must_use]
    pub fn new() -> Self {
        Self {
            port: COAP_PORT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-call reply timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the destination port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Send a NON POST to `addr` without waiting for a reply.
    ///
    /// # Errors
    ///
    /// Returns [`CoapError::Io`] on socket bind or send failure.
    pub async fn post(&self, addr: Ipv6Addr, uri_path: &str, payload: &str) -> Result<(), CoapError> {
        let socket = UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0)).await?;
        let frame = codec::encode_post(uri_path, payload);
        socket.send_to(&frame, (addr, self.port)).await?;
        trace!(%addr, uri_path, bytes = frame.len(), "CoAP POST sent");
        Ok(())
    }

    /// Send a NON GET to `addr` and wait for a 2.xx JSON reply.
    ///
    /// Returns `Ok(None)` when the node does not answer within the
    /// timeout, answers with a non-success code, or the payload is not
    /// JSON — callers treat all three as "node unavailable".
    ///
    /// # Errors
    ///
    /// Returns [`CoapError::Io`] on socket bind or send failure.
    pub async fn get_json(
        &self,
        addr: Ipv6Addr,
        uri_path: &str,
    ) -> Result<Option<serde_json::Value>, CoapError> {
        let socket = UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0)).await?;
        let frame = codec::encode_get(uri_path);
        socket.send_to(&frame, (addr, self.port)).await?;

        let mut buf = vec![0u8; RECV_BUFFER];
        let received = match tokio::time::timeout(self.timeout, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _peer))) => len,
            Ok(Err(e)) => return Err(e.into()),
            Err(_elapsed) => {
                debug!(%addr, uri_path, "CoAP GET timed out");
                return Ok(None);
            },
        };

        let message = match codec::decode(&buf[..received]) {
            Ok(m) => m,
            Err(e) => {
                debug!(%addr, error = %e, "Undecodable CoAP reply");
                return Ok(None);
            },
        };

        if !message.code.is_success() || message.payload.is_empty() {
            debug!(%addr, code = %message.code, "CoAP reply without content");
            return Ok(None);
        }

        let text = String::from_utf8_lossy(&message.payload);
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(%addr, error = %e, "CoAP reply payload is not JSON");
                Ok(None)
            },
        }
    }
}

impl Default for CoapClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bind a local UDP responder that answers the first request with
    /// the given frame.
    async fn spawn_responder(reply: Vec<u8>) -> u16 {
        let socket = UdpSocket::bind((Ipv6Addr::LOCALHOST, 0)).await.unwrap();
        let port = socket.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = vec![0u8; RECV_BUFFER];
            if let Ok((_, peer)) = socket.recv_from(&mut buf).await {
                let _ = socket.send_to(&reply, peer).await;
            }
        });
        port
    }

    #[tokio::test]
    async fn get_json_decodes_success_reply() {
        let mut reply = vec![0x60, 0x45, 0x00, 0x01, 0xff];
        reply.extend_from_slice(br#"{"rloc16":"0xc400","role":"router"}"#);
        let port = spawn_responder(reply).await;

        let client = CoapClient::new().with_port(port);
        let value = client
            .get_json(Ipv6Addr::LOCALHOST, "network-info")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value["role"], "router");
    }

    #[tokio::test]
    async fn get_json_times_out_quietly() {
        // Nothing listens on this socket's peer; use a bound-but-silent port.
        let silent = UdpSocket::bind((Ipv6Addr::LOCALHOST, 0)).await.unwrap();
        let port = silent.local_addr().unwrap().port();

        let client = CoapClient::new()
            .with_port(port)
            .with_timeout(Duration::from_millis(50));
        let result = client.get_json(Ipv6Addr::LOCALHOST, "network-info").await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn get_json_ignores_error_codes() {
        // 4.04 Not Found with a payload.
        let mut reply = vec![0x60, 0x84, 0x00, 0x01, 0xff];
        reply.extend_from_slice(b"gone");
        let port = spawn_responder(reply).await;

        let client = CoapClient::new().with_port(port);
        let result = client.get_json(Ipv6Addr::LOCALHOST, "network-info").await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn post_fires_and_forgets() {
        let socket = UdpSocket::bind((Ipv6Addr::LOCALHOST, 0)).await.unwrap();
        let port = socket.local_addr().unwrap().port();

        let client = CoapClient::new().with_port(port);
        client
            .post(Ipv6Addr::LOCALHOST, "led", "red:on")
            .await
            .unwrap();

        let mut buf = vec![0u8; RECV_BUFFER];
        let (len, _) = socket.recv_from(&mut buf).await.unwrap();
        let msg = codec::decode(&buf[..len]).unwrap();
        assert_eq!(msg.uri_path, "led");
        assert_eq!(msg.payload, b"red:on");
    }
}
