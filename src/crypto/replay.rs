//! Replay protection by timestamp window.

use crate::clock::SharedClock;

/// Default accepted distance between a request timestamp and now.
pub const DEFAULT_MAX_AGE_MS: u64 = 300_000;

/// Rejects timestamps too far in the past or the future.
#[derive(Debug, Clone)]
pub struct ReplayGuard {
    clock: SharedClock,
    max_age_ms: u64,
}

impl ReplayGuard {
    pub fn new(clock: SharedClock, max_age_ms: u64) -> Self {
        Self { clock, max_age_ms }
    }

    pub fn max_age_ms(&self) -> u64 {
        self.max_age_ms
    }

    /// Valid iff `|now - timestamp| <= max_age_ms`.
    pub fn is_timestamp_valid(&self, timestamp_ms: u64) -> bool {
        self.is_timestamp_valid_within(timestamp_ms, self.max_age_ms)
    }

    pub fn is_timestamp_valid_within(&self, timestamp_ms: u64, max_age_ms: u64) -> bool {
        self.clock.now_ms().abs_diff(timestamp_ms) <= max_age_ms
    }
}
