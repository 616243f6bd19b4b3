//! Outbound event sink

use tokio::sync::broadcast;
use tracing::debug;
use workday_api::Event;

/// Fire-and-forget publisher for status changes
pub trait EventSink: Send + Sync {
    fn publish(&self, event: Event);
}

/// Fans events out to any number of in-process subscribers.
///
/// Slow subscribers lose the oldest events; publishing never blocks.
pub struct BroadcastSink {
    tx: broadcast::Sender<Event>,
}

impl BroadcastSink {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: Event) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            debug!(event = name, "No subscribers for event");
        }
    }
}
