//! Event bus for ticket domain events
//!
//! A thin wrapper over a tokio broadcast channel. Publishers never
//! block and never fail: an event with no subscribers is simply
//! dropped, and a slow subscriber lags rather than backpressuring the
//! publisher.

use caseflow_types::TicketEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Default broadcast capacity before slow subscribers start lagging
const DEFAULT_CAPACITY: usize = 256;

/// Bus for publishing and subscribing to ticket events
pub struct EventBus {
    sender: broadcast::Sender<TicketEvent>,
    published: AtomicU64,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            published: AtomicU64::new(0),
        }
    }

    /// Publish an event. Returns the number of subscribers it reached.
    pub fn publish(&self, event: TicketEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(kind = event.kind(), ticket_id = %event.ticket_id(), "Event published");
        // Ignore errors: no receivers just means nobody is listening yet
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<TicketEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total events published since creation
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
