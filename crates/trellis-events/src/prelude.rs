//! Convenience re-exports for downstream crates.

pub use crate::bus::{EventBus, EventReceiver};
pub use crate::event::MeshEvent;
