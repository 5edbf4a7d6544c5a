//! # Rate Limiter
//!
//! Trailing-window event counter used by every admission limit.
//!
//! ## Security
//!
//! The ledger is append-only and can never be pruned, so spam has to be
//! stopped before it is written. Windows here are *trailing*: an event at
//! time `t` counts at time `now` while `now - t < window_secs`.
//!
//! Counting (`count_at`) never mutates, so a caller can evaluate every limit
//! first and only `record` once the guarded action has been committed.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Sliding window event counter.
///
/// # Algorithm
///
/// Keeps the timestamps of recorded events in arrival order:
/// - `count_at(now)` counts timestamps still inside the window
/// - `record(now)` prunes expired timestamps, then appends `now`
///
/// Memory is bounded by the number of events that can fit in one window,
/// which the admission caps keep small.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidingWindowCounter {
    /// Window length in seconds.
    window_secs: u64,
    /// Event timestamps, oldest first.
    events: VecDeque<Timestamp>,
}

impl SlidingWindowCounter {
    /// Create a counter for a window of `window_secs` seconds.
    #[must_use]
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_secs,
            events: VecDeque::new(),
        }
    }

    /// Window length in seconds.
    #[must_use]
    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Number of recorded events inside the window ending at `now`.
    #[must_use]
    pub fn count_at(&self, now: Timestamp) -> usize {
        self.events
            .iter()
            .filter(|&&t| self.in_window(t, now))
            .count()
    }

    /// Returns true if recording one more event at `now` would exceed `max`.
    #[must_use]
    pub fn would_exceed(&self, now: Timestamp, max: usize) -> bool {
        self.count_at(now) >= max
    }

    /// Earliest time at which the window will hold fewer than `max` events,
    /// or `None` if it already does.
    #[must_use]
    pub fn next_slot_at(&self, now: Timestamp, max: usize) -> Option<Timestamp> {
        let mut live: Vec<Timestamp> = self
            .events
            .iter()
            .copied()
            .filter(|&t| self.in_window(t, now))
            .collect();
        let max = max.max(1);
        if live.len() < max {
            return None;
        }
        live.sort_unstable();
        // The slot opens when the oldest event that keeps us at the cap expires.
        let pivot = live[live.len() - max];
        Some(pivot.saturating_add(self.window_secs))
    }

    /// Record an event at `now`, dropping events that have left the window.
    pub fn record(&mut self, now: Timestamp) {
        self.prune(now);
        self.events.push_back(now);
    }

    /// Remove events that are no longer inside the window ending at `now`.
    pub fn prune(&mut self, now: Timestamp) {
        while let Some(&front) = self.events.front() {
            if self.in_window(front, now) {
                break;
            }
            self.events.pop_front();
        }
    }

    /// Total events currently retained (including not-yet-pruned ones).
    #[must_use]
    pub fn retained(&self) -> usize {
        self.events.len()
    }

    fn in_window(&self, event: Timestamp, now: Timestamp) -> bool {
        // Events recorded "after" now (clock skew) stay inside the window.
        now.saturating_sub(event) < self.window_secs
    }
}
