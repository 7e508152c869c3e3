//! Trellis Config - file-backed lookup tables for the coordinator.
//!
//! This crate provides:
//! - The node inventory (`adresses.json`): business name ↔ ML-EID,
//!   playback ordering, adjacency hints
//! - The Border Router credential store (`border_routers.json`):
//!   auth tokens, network prefixes, declared node lists
//!
//! Both sit behind a TTL cache (default 60 s) with atomic snapshot
//! swap: a reload never mutates a snapshot a reader already holds,
//! and no lock is held across file I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod credentials;
mod error;
mod inventory;

pub use credentials::{BrCredentials, BrEntry, generate_token};
pub use error::ConfigError;
pub use inventory::{NodeEntry, NodeInventory, OrderedNode};

/// Default cache TTL for both stores.
pub const DEFAULT_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(60);
