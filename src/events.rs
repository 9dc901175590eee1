//! Typed broadcast channel for store notifications.
use log::trace;
use tokio::sync::broadcast;

/// Emitted by `OpportunityStore` after a change has been persisted
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Loaded { count: usize },
    Added { id: String },
    Updated { id: String },
    Deleted { id: String },
}

/// Fan-out channel; every subscriber sees every event published after it
/// subscribed. Slow subscribers lose the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus<T: Clone> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone + std::fmt::Debug> EventBus<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: T) -> usize {
        trace!("Publishing {:?}", event);
        // No subscribers is fine
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }
}
