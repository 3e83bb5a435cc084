/*!
 * Clocks
 * Time sources for allocation timestamps and reclamation ages
 */

use super::types::{micros, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of allocator timestamps
///
/// Timestamps are microseconds relative to an arbitrary, clock-specific epoch
/// and must never go backwards.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Monotonic clock backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Timestamp {
        micros(self.epoch.elapsed())
    }
}

/// Manually driven clock
///
/// Clones share the same counter, so a test can keep one handle and hand the
/// other to the allocator.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let by = micros(by);
        // Never fails: the closure always returns Some
        let _ = self
            .micros
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(by))
            });
    }

    /// Jump to an absolute timestamp; earlier values are ignored
    pub fn set(&self, micros: Timestamp) {
        self.micros.fetch_max(micros, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Timestamp {
        self.micros.load(Ordering::SeqCst)
    }
}
