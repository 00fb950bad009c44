//! Event bus for automator runs
//!
//! The engine reports every transition of a run here, and the default string
//! handler publishes simulated key presses. Listeners can subscribe to a
//! single [`EventKind`] or to everything.

use automator_core::{Event, EventKind};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The event bus for publishing and subscribing to events
pub struct EventBus {
    /// Map of event kinds to their broadcast senders
    listeners: DashMap<EventKind, broadcast::Sender<Event>>,
    /// Sender for subscribers to every kind
    match_all_sender: broadcast::Sender<Event>,
    /// Channel capacity
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            match_all_sender,
            capacity,
        }
    }

    /// Subscribe to events of one kind
    pub fn subscribe(&self, kind: EventKind) -> broadcast::Receiver<Event> {
        trace!(?kind, "Subscribing to event kind");

        self.listeners
            .entry(kind)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to all events
    pub fn subscribe_all(&self) -> broadcast::Receiver<Event> {
        self.match_all_sender.subscribe()
    }

    /// Fire an event to all subscribers
    ///
    /// The event is delivered to subscribers of its kind and to every
    /// match-all subscriber.
    pub fn fire(&self, event: Event) {
        trace!(kind = ?event.kind(), "Firing event");

        if let Some(sender) = self.listeners.get(&event.kind()) {
            // Send errors only mean nobody is listening
            let _ = sender.send(event.clone());
        }

        let _ = self.match_all_sender.send(event);
    }

    /// Number of live receivers across all subscriptions
    pub fn subscriber_count(&self) -> usize {
        let per_kind: usize = self
            .listeners
            .iter()
            .map(|entry| entry.value().receiver_count())
            .sum();
        per_kind + self.match_all_sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;
