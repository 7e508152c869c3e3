//! Trellis Gateway - the authenticated multi-BR WebSocket hub.
//!
//! Each Border Router holds one upstream WebSocket session here. Per
//! session the gateway runs two flows: an RX loop (the accepting task)
//! and a TX worker fed by an outbound queue, coordinated through a
//! shutdown sentinel. Inbound frames are routed by `type`, enriched
//! through the name resolver, folded into the topology aggregator, and
//! fanned out on the event bus.
//!
//! Collaborators are wired once at startup into a [`GatewayContext`] —
//! no module-level state.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod commands;
pub mod config;
pub mod resolver;
pub mod scan;

mod context;
mod error;
mod router;
mod server;
mod session;

pub use commands::{BrCommand, CommandError, send_command_to_node, send_scan_node};
pub use config::GatewayConfig;
pub use context::GatewayContext;
pub use error::GatewayError;
pub use resolver::NameResolver;
pub use server::GatewayServer;
pub use session::BrConnection;
