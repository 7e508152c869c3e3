//! Trellis Registry - who is connected, and who fronts which node.
//!
//! This crate provides:
//! - The BR session registry: one record per Border Router id, at most
//!   one online session each, heartbeat-based liveness, counters
//! - The background liveness sweeper
//! - The dynamic IPv6 → (business name, owning BR) mapping built from
//!   observed traffic
//!
//! Records survive disconnection (for statistics); the node→BR index
//! only ever points at online sessions.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod mapping;
mod registry;
mod sweeper;

pub use mapping::{ActiveNode, DEFAULT_ACTIVE_WINDOW, NodeAddressMap};
pub use registry::{
    BrRegistry, BrSessionSnapshot, BrStatus, DEFAULT_HEARTBEAT_TIMEOUT, RegistryStats, SessionId,
};
pub use sweeper::{SWEEP_PERIOD, spawn_sweeper};
