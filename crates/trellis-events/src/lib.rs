//! Trellis Events - the fan-out bus between the BR gateway and its
//! upstream observers.
//!
//! Enriched events flow out of the gateway's message router on named
//! channels (`node_event`, `diagnostic_node`, ...). Observers — web
//! bridges, CoAP-side consumers for button/battery/BLE payloads —
//! subscribe to the channels they care about at startup.
//!
//! Publishing never blocks: the bus sits on a bounded broadcast
//! channel, and a subscriber that falls behind skips the events it
//! missed (with a warning) rather than stalling a BR's RX loop.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod event;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::MeshEvent;
