//! Trellis Core - Thread address classes and node identity types.
//!
//! This crate provides:
//! - The Thread IPv6 address taxonomy (ML-EID, RLOC/ALOC, link-local)
//! - EUI-64 extended addresses and the link-local derivation rule
//! - `Rloc16` routing locators and `Role` ordering
//!
//! Everything here is pure: no I/O, no clocks beyond [`epoch_secs`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod addr;
pub mod prelude;

mod error;
mod ident;

pub use addr::{AddrClass, Ipv6Prefix, classify};
pub use error::CoreError;
pub use ident::{ExtAddr, Rloc16, Role};

/// Current wall-clock time as fractional epoch seconds.
///
/// The BR wire protocol carries timestamps in this form
/// (`server_time`, event `timestamp` fields).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn epoch_secs() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp_micros() as f64 / 1_000_000.0
}
