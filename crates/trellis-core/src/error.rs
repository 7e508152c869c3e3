//! Error types for address and identity parsing.

/// Errors produced when parsing Thread identity types.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Extended address was not 8 bytes of hex.
    #[error("invalid extended address: {0}")]
    InvalidExtAddr(String),

    /// RLOC16 was not a 16-bit hex value.
    #[error("invalid rloc16: {0}")]
    InvalidRloc16(String),

    /// IPv6 prefix was not `<addr>/<len>` with len <= 128.
    #[error("invalid IPv6 prefix: {0}")]
    InvalidPrefix(String),

    /// Unknown Thread role name.
    #[error("unknown role: {0}")]
    UnknownRole(String),
}
