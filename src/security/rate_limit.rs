//! Fixed-window rate limiting with cool-down blocking.
//!
//! One limiter type serves both the per-session and the per-IP quota; the
//! two instances keep independent records and both must admit a request.

use std::fmt;

use thiserror::Error;

use crate::clock::SharedClock;
use crate::config::RateLimitConfig;
use crate::security::history::RequestEntry;
use crate::security::store::{InMemorySessionStore, SessionRecord, SessionStore};

/// Which quota a limiter enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitScope {
    Session,
    Ip,
}

impl LimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitScope::Session => "session",
            LimitScope::Ip => "ip",
        }
    }
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key was refused admission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{scope} rate limit exceeded for {key}: {details} (retry after {retry_after_secs}s)")]
pub struct RateLimitError {
    pub scope: LimitScope,
    pub key: String,
    pub retry_after_secs: u64,
    pub details: String,
}

enum Rejection {
    /// Already blocked; `remaining_ms` of the cool-down left.
    Blocked { remaining_ms: u64 },
    /// Quota just ran out and a cool-down of `cool_down_ms` started.
    Exhausted { cool_down_ms: u64 },
    /// Quota is held by uncommitted reservations; nothing is blocked.
    InFlight,
}

/// Retry hint while the quota is only held by in-flight admissions.
const IN_FLIGHT_RETRY_MS: u64 = 1_000;

/// Keyed fixed-window admission counter.
///
/// State per key: Active → (quota reached) → Blocked → (cool-down elapsed
/// or explicit unblock) → Active. Records leave the store only through
/// [`reset_session`](Self::reset_session) or [`cleanup`](Self::cleanup).
pub struct SlidingWindowLimiter<S: SessionStore = InMemorySessionStore> {
    scope: LimitScope,
    store: S,
    clock: SharedClock,
    window_ms: u64,
    max_requests: u32,
    block_duration_ms: Option<u64>,
    idle_ttl_ms: u64,
}

impl SlidingWindowLimiter<InMemorySessionStore> {
    pub fn new(scope: LimitScope, config: &RateLimitConfig, clock: SharedClock) -> Self {
        Self::with_store(scope, config, clock, InMemorySessionStore::new())
    }
}

impl<S: SessionStore> SlidingWindowLimiter<S> {
    pub fn with_store(scope: LimitScope, config: &RateLimitConfig, clock: SharedClock, store: S) -> Self {
        Self {
            scope,
            store,
            clock,
            window_ms: config.window_ms,
            max_requests: config.max_requests,
            block_duration_ms: config.block_duration_ms,
            idle_ttl_ms: config.idle_ttl_ms,
        }
    }

    pub fn scope(&self) -> LimitScope {
        self.scope
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Admit or refuse `key` without accounting a request.
    pub fn check_limit(&self, key: &str) -> Result<(), RateLimitError> {
        let now = self.clock.now_ms();
        self.store
            .update(key, || SessionRecord::new(now), |record| self.evaluate(record, now))
            .map_err(|rejection| self.rejection_error(key, rejection))
    }

    /// Check and reserve a slot in one atomic step.
    ///
    /// Concurrent callers on the same key can never be admitted past the
    /// quota: the reservation counts against it until the returned
    /// [`Admission`] is committed or dropped. Refusals caused only by
    /// outstanding reservations are transient and never block the key.
    pub fn try_acquire(&self, key: &str) -> Result<Admission<'_, S>, RateLimitError> {
        let now = self.clock.now_ms();
        self.store
            .update(key, || SessionRecord::new(now), |record| -> Result<(), Rejection> {
                self.evaluate(record, now)?;
                record.reserved += 1;
                Ok(())
            })
            .map_err(|rejection| self.rejection_error(key, rejection))?;

        Ok(Admission {
            limiter: self,
            key: key.to_string(),
            settled: false,
        })
    }

    /// Account one request against `key`.
    pub fn record_request(&self, key: &str, endpoint: &str, success: bool) {
        let now = self.clock.now_ms();
        self.store.update(key, || SessionRecord::new(now), |record| {
            Self::account(record, now, endpoint, success);
        });
    }

    /// Forget `key` entirely.
    pub fn reset_session(&self, key: &str) {
        if self.store.remove(key).is_some() {
            tracing::info!(scope = %self.scope, key = %key, "Rate limit record reset");
        }
    }

    /// Block `key` for `duration_ms` regardless of its window state.
    pub fn block_session(&self, key: &str, duration_ms: u64) {
        let now = self.clock.now_ms();
        self.store.update(key, || SessionRecord::new(now), |record| {
            record.is_blocked = true;
            record.blocked_until = Some(now.saturating_add(duration_ms));
        });
        tracing::info!(scope = %self.scope, key = %key, duration_ms, "Key blocked");
    }

    /// Lift a block. The request counter is left as is.
    pub fn unblock_session(&self, key: &str) {
        let found = self.store.update_existing(key, |record| {
            record.is_blocked = false;
            record.blocked_until = None;
        });
        if found.is_some() {
            tracing::info!(scope = %self.scope, key = %key, "Key unblocked");
        }
    }

    /// Requests still admissible in the current window.
    pub fn remaining_requests(&self, key: &str) -> u32 {
        let now = self.clock.now_ms();
        match self.store.get(key) {
            None => self.max_requests,
            Some(record) if record.is_blocked_at(now) => 0,
            Some(record) if self.window_elapsed(&record, now) => self.max_requests,
            Some(record) => self
                .max_requests
                .saturating_sub(record.request_count.saturating_add(record.reserved)),
        }
    }

    /// When `key` can next be admitted at full quota: the end of a running
    /// block, else the end of the current window. `None` for unknown keys
    /// and windows that already elapsed.
    pub fn reset_time(&self, key: &str) -> Option<u64> {
        let now = self.clock.now_ms();
        let record = self.store.get(key)?;
        if record.is_blocked_at(now) {
            return record.blocked_until;
        }
        if self.window_elapsed(&record, now) {
            return None;
        }
        Some(record.window_start.saturating_add(self.window_ms))
    }

    /// Copy of the record for `key`.
    pub fn snapshot(&self, key: &str) -> Option<SessionRecord> {
        self.store.get(key)
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }

    /// Evict records idle past the TTL that are neither blocked nor holding
    /// reservations. Locks one key at a time; a failing key is logged and
    /// skipped. Returns the number of evicted records.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now_ms();
        let idle_ttl_ms = self.idle_ttl_ms;
        let is_idle = |record: &SessionRecord| {
            !record.is_blocked_at(now)
                && record.reserved == 0
                && now >= record.window_start.saturating_add(idle_ttl_ms)
        };

        let mut evicted = 0;
        for key in self.store.keys() {
            match self.store.remove_if(&key, &is_idle) {
                Ok(true) => evicted += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(scope = %self.scope, key = %key, error = %e, "Cleanup skipped key");
                }
            }
        }

        if evicted > 0 {
            tracing::debug!(scope = %self.scope, evicted, remaining = self.store.len(), "Rate limit cleanup");
        }
        evicted
    }

    fn evaluate(&self, record: &mut SessionRecord, now: u64) -> Result<(), Rejection> {
        if record.is_blocked {
            match record.blocked_until {
                Some(until) if now < until => {
                    return Err(Rejection::Blocked { remaining_ms: until - now });
                }
                _ => {
                    record.is_blocked = false;
                    record.blocked_until = None;
                }
            }
        }

        if self.window_elapsed(record, now) {
            record.window_start = now;
            record.request_count = 0;
        }

        if record.request_count >= self.max_requests {
            let window_left = record
                .window_start
                .saturating_add(self.window_ms)
                .saturating_sub(now);
            let cool_down_ms = self.block_duration_ms.unwrap_or(window_left);
            record.is_blocked = true;
            record.blocked_until = Some(now.saturating_add(cool_down_ms));
            tracing::debug!(
                scope = %self.scope,
                count = record.request_count,
                cool_down_ms,
                "Quota exhausted, key blocked"
            );
            return Err(Rejection::Exhausted { cool_down_ms });
        }

        // reservations may still be released, so they never start a cool-down
        if record.request_count.saturating_add(record.reserved) >= self.max_requests {
            return Err(Rejection::InFlight);
        }

        Ok(())
    }

    fn window_elapsed(&self, record: &SessionRecord, now: u64) -> bool {
        now.saturating_sub(record.window_start) >= self.window_ms
    }

    fn account(record: &mut SessionRecord, now: u64, endpoint: &str, success: bool) {
        record.request_count = record.request_count.saturating_add(1);
        record.request_history.push(RequestEntry {
            timestamp: now,
            endpoint: endpoint.to_string(),
            success,
        });
    }

    fn settle(&self, key: &str, outcome: Option<(&str, bool)>) {
        let now = self.clock.now_ms();
        match outcome {
            Some((endpoint, success)) => {
                self.store.update(key, || SessionRecord::new(now), |record| {
                    record.reserved = record.reserved.saturating_sub(1);
                    Self::account(record, now, endpoint, success);
                });
            }
            None => {
                self.store.update_existing(key, |record| {
                    record.reserved = record.reserved.saturating_sub(1);
                });
            }
        }
    }

    fn rejection_error(&self, key: &str, rejection: Rejection) -> RateLimitError {
        let (remaining_ms, details) = match rejection {
            Rejection::Blocked { remaining_ms } => (remaining_ms, "temporarily blocked".to_string()),
            Rejection::Exhausted { cool_down_ms } => (
                cool_down_ms,
                format!(
                    "limit of {} requests per {}s reached",
                    self.max_requests,
                    self.window_ms.div_ceil(1000)
                ),
            ),
            Rejection::InFlight => (
                IN_FLIGHT_RETRY_MS,
                format!("all {} requests of the window are in flight", self.max_requests),
            ),
        };
        RateLimitError {
            scope: self.scope,
            key: key.to_string(),
            retry_after_secs: remaining_ms.div_ceil(1000),
            details,
        }
    }
}

impl<S: SessionStore> fmt::Debug for SlidingWindowLimiter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("scope", &self.scope)
            .field("window_ms", &self.window_ms)
            .field("max_requests", &self.max_requests)
            .field("tracked_keys", &self.store.len())
            .finish_non_exhaustive()
    }
}

/// A reserved slot in a limiter window.
///
/// [`commit`](Self::commit) turns it into a recorded request; dropping it
/// uncommitted gives the slot back.
#[must_use = "dropping an Admission releases the reserved slot"]
#[derive(Debug)]
pub struct Admission<'a, S: SessionStore = InMemorySessionStore> {
    limiter: &'a SlidingWindowLimiter<S>,
    key: String,
    settled: bool,
}

impl<S: SessionStore> Admission<'_, S> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn commit(mut self, endpoint: &str, success: bool) {
        self.settled = true;
        self.limiter.settle(&self.key, Some((endpoint, success)));
    }
}

impl<S: SessionStore> Drop for Admission<'_, S> {
    fn drop(&mut self) {
        if !self.settled {
            self.limiter.settle(&self.key, None);
        }
    }
}
