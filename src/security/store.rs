//! Keyed storage for limiter records.
//!
//! The limiter talks to its records only through [`SessionStore`], so the
//! in-memory map can later be replaced by a shared cache without touching
//! call sites.

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

use crate::security::history::RequestHistory;

/// Rate-limit state for one session or one client IP.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub request_count: u32,
    pub window_start: u64,
    pub is_blocked: bool,
    pub blocked_until: Option<u64>,
    /// Admissions handed out but not yet committed or released.
    pub reserved: u32,
    pub request_history: RequestHistory,
}

impl SessionRecord {
    pub fn new(now_ms: u64) -> Self {
        Self {
            request_count: 0,
            window_start: now_ms,
            is_blocked: false,
            blocked_until: None,
            reserved: 0,
            request_history: RequestHistory::default(),
        }
    }

    /// Blocked with a cool-down still running at `now_ms`.
    pub fn is_blocked_at(&self, now_ms: u64) -> bool {
        self.is_blocked && self.blocked_until.is_some_and(|until| now_ms < until)
    }
}

/// Storage backend failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Storage interface for limiter records.
///
/// `update` must run its closure with the record exclusively locked: the
/// limiter relies on it to make check-and-reserve atomic per key.
pub trait SessionStore: Send + Sync + 'static {
    /// Run `f` on the record for `key`, inserting `init()` first if absent.
    fn update<R>(
        &self,
        key: &str,
        init: impl FnOnce() -> SessionRecord,
        f: impl FnOnce(&mut SessionRecord) -> R,
    ) -> R;

    /// Run `f` on the record for `key` only if it exists.
    fn update_existing<R>(&self, key: &str, f: impl FnOnce(&mut SessionRecord) -> R) -> Option<R>;

    /// Snapshot of the record for `key`.
    fn get(&self, key: &str) -> Option<SessionRecord>;

    fn remove(&self, key: &str) -> Option<SessionRecord>;

    /// Remove `key` if `predicate` holds, locking only that key.
    fn remove_if(
        &self,
        key: &str,
        predicate: &dyn Fn(&SessionRecord) -> bool,
    ) -> Result<bool, StoreError>;

    fn keys(&self) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    records: DashMap<String, SessionRecord>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn update<R>(
        &self,
        key: &str,
        init: impl FnOnce() -> SessionRecord,
        f: impl FnOnce(&mut SessionRecord) -> R,
    ) -> R {
        if let Some(mut record) = self.records.get_mut(key) {
            return f(record.value_mut());
        }
        let mut record = self.records.entry(key.to_string()).or_insert_with(init);
        f(record.value_mut())
    }

    fn update_existing<R>(&self, key: &str, f: impl FnOnce(&mut SessionRecord) -> R) -> Option<R> {
        self.records.get_mut(key).map(|mut record| f(record.value_mut()))
    }

    fn get(&self, key: &str) -> Option<SessionRecord> {
        self.records.get(key).map(|r| r.value().clone())
    }

    fn remove(&self, key: &str) -> Option<SessionRecord> {
        self.records.remove(key).map(|(_, record)| record)
    }

    fn remove_if(
        &self,
        key: &str,
        predicate: &dyn Fn(&SessionRecord) -> bool,
    ) -> Result<bool, StoreError> {
        Ok(self.records.remove_if(key, |_, record| predicate(record)).is_some())
    }

    fn keys(&self) -> Vec<String> {
        self.records.iter().map(|r| r.key().clone()).collect()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
