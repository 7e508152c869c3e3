//! Trellis CoAP - the strict RFC 7252 subset spoken by Thread end nodes.
//!
//! This crate provides:
//! - A codec for the NON/ACK frames the nodes exchange (fixed header,
//!   zero-length token, Uri-Path options, `0xFF` payload marker)
//! - A one-shot UDP/IPv6 client for direct node probes during discovery
//!
//! No retransmission is attempted anywhere: unreliability is delegated
//! to callers (the scan orchestrator reissues probes).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod client;
mod codec;
mod error;

pub use client::CoapClient;
pub use codec::{
    COAP_PORT, CoapMessage, Code, MessageType, decode, encode_ack, encode_get, encode_post,
};
pub use error::CoapError;
