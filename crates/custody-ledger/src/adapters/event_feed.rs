//! # In-Memory Event Feed
//!
//! [`EventSink`] adapter combining a retained log (replay from any sequence,
//! including genesis) with a broadcast channel for live subscribers.

use crate::domain::value_objects::Timestamp;
use crate::events::{LedgerEvent, LedgerEventKind};
use crate::ports::outbound::EventSink;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

/// Default broadcast channel capacity.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Retained, broadcast notification feed.
#[derive(Debug)]
pub struct InMemoryEventFeed {
    sender: broadcast::Sender<LedgerEvent>,
    log: RwLock<Vec<LedgerEvent>>,
    events_published: AtomicU64,
}

impl InMemoryEventFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            log: RwLock::new(Vec::new()),
            events_published: AtomicU64::new(0),
        }
    }

    /// Receive every event published from now on.
    ///
    /// A receiver that falls more than the channel capacity behind gets
    /// `RecvError::Lagged` and should catch up through `replay`.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InMemoryEventFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for InMemoryEventFeed {
    async fn publish(&self, timestamp: Timestamp, kind: LedgerEventKind) -> LedgerEvent {
        let event = {
            let mut log = self.log.write().unwrap_or_else(PoisonError::into_inner);
            let event = LedgerEvent {
                sequence: log.len() as u64,
                timestamp,
                kind,
            };
            log.push(event.clone());
            event
        };
        self.events_published.fetch_add(1, Ordering::Relaxed);

        // No live subscribers is fine: the log still has it.
        let receivers = self.sender.send(event.clone()).unwrap_or(0);
        debug!(
            sequence = event.sequence,
            event = event.kind.name(),
            receivers,
            "Event published"
        );
        event
    }

    async fn replay(&self, from: u64) -> Vec<LedgerEvent> {
        let log = self.log.read().unwrap_or_else(PoisonError::into_inner);
        let start = usize::try_from(from).map_or(log.len(), |n| n.min(log.len()));
        log[start..].to_vec()
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
