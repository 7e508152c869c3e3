//! Error types for the gateway.

/// Errors that abort gateway startup or a session handshake.
///
/// Per-session runtime failures (read errors, malformed frames) are
/// logged and contained; only listener binding and credential-store
/// loading are fatal.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The WebSocket listener could not bind. Fatal.
    #[error("failed to bind WebSocket listener: {0}")]
    Bind(#[source] std::io::Error),

    /// Credential store could not be loaded at startup. Fatal.
    #[error(transparent)]
    Config(#[from] trellis_config::ConfigError),

    /// WebSocket handshake or transport error on a session.
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}
