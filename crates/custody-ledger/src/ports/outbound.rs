//! # Driven Ports (SPI - Outbound)
//!
//! What the ledger needs from its environment: a clock for callers that do
//! not supply commit times themselves, and a sink for notifications.

use crate::domain::value_objects::Timestamp;
use crate::events::{LedgerEvent, LedgerEventKind};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// TIME
// =============================================================================

/// Source of commit timestamps (unix seconds).
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Hand-driven clock for deterministic tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    time: AtomicU64,
}

impl ManualClock {
    #[must_use]
    pub fn new(initial: Timestamp) -> Self {
        Self {
            time: AtomicU64::new(initial),
        }
    }

    /// Move forward by `secs` and return the new time.
    pub fn advance(&self, secs: u64) -> Timestamp {
        self.time.fetch_add(secs, Ordering::SeqCst) + secs
    }

    pub fn set(&self, time: Timestamp) {
        self.time.store(time, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        self.time.load(Ordering::SeqCst)
    }
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// Destination for committed-transition notifications.
///
/// The sink assigns the feed sequence; publishing never fails from the
/// ledger's point of view.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Append an event to the feed and deliver it to live subscribers.
    async fn publish(&self, timestamp: Timestamp, kind: LedgerEventKind) -> LedgerEvent;

    /// Every retained event with `sequence >= from`, oldest first.
    async fn replay(&self, from: u64) -> Vec<LedgerEvent>;

    /// Total events published.
    fn events_published(&self) -> u64;
}
