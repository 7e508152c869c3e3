//! Error types for the CoAP codec and client.

/// Errors produced by the CoAP codec and UDP client.
#[derive(Debug, thiserror::Error)]
pub enum CoapError {
    /// The frame is malformed: short header or an option walk that
    /// runs past the end of the buffer.
    #[error("invalid CoAP frame: {0}")]
    InvalidFrame(String),

    /// Socket-level failure (bind or send).
    #[error("UDP I/O error: {0}")]
    Io(#[from] std::io::Error),
}
