//! Event bus for broadcasting enriched events to subscribers.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::event::MeshEvent;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Fan-out bus carrying [`MeshEvent`]s to all subscribers.
///
/// Backed by a bounded broadcast channel: `publish` never blocks, and
/// a subscriber that cannot keep up loses its oldest pending events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<MeshEvent>>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with an explicit capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers the event was delivered to.
    /// Zero receivers is not an error.
    pub fn publish(&self, event: MeshEvent) -> usize {
        let channel = event.channel();
        let event = Arc::new(event);

        trace!(channel, "Publishing event");

        if let Ok(count) = self.sender.send(event) {
            debug!(channel, receiver_count = count, "Event published");
            count
        } else {
            trace!(channel, "No receivers for event");
            0
        }
    }

    /// Subscribe to every channel.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            channels: None,
        }
    }

    /// Subscribe to a fixed set of named channels.
    ///
    /// Events on other channels are skipped inside `recv`; the
    /// interest set is declared once, at subscription time.
    #[must_use]
    pub fn subscribe_to(&self, channels: &[&'static str]) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            channels: Some(channels.iter().copied().collect()),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Configured channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver side of the bus, optionally filtered by channel.
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<MeshEvent>>,
    channels: Option<HashSet<&'static str>>,
}

impl EventReceiver {
    /// Receive the next matching event.
    ///
    /// Returns `None` when the bus is gone. Lagging drops the missed
    /// events and keeps receiving.
    pub async fn recv(&mut self) -> Option<Arc<MeshEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                },
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive without blocking; `None` when nothing matching is queued.
    pub fn try_recv(&mut self) -> Option<Arc<MeshEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                },
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }

    fn matches(&self, event: &MeshEvent) -> bool {
        self.channels
            .as_ref()
            .is_none_or(|set| set.contains(event.channel()))
    }
}
