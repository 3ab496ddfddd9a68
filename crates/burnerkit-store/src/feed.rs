//! Change notification for store mutations.
//!
//! Every write publishes a [`StoreEvent`]. Waiters subscribe and re-check the
//! key they care about instead of polling on a fixed interval.

use tokio::sync::broadcast;

/// Buffered events per subscriber before it starts lagging.
const FEED_CAPACITY: usize = 256;

/// What happened to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Set,
    Removed,
}

/// A single mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub key: String,
    pub kind: ChangeKind,
}

/// Broadcast side of the change feed, owned by a store backend.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<StoreEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, key: &str, kind: ChangeKind) {
        let _ = self.tx.send(StoreEvent {
            key: key.to_string(),
            kind,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
