//! Bounded per-key request history.

use std::collections::VecDeque;

use serde::ser::{Serialize, Serializer};

/// Entries kept per key before the oldest is evicted.
pub const HISTORY_CAPACITY: usize = 100;

/// One accounted request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RequestEntry {
    pub timestamp: u64,
    pub endpoint: String,
    pub success: bool,
}

/// Fixed-capacity FIFO ring buffer; push is O(1) and evicts the oldest entry when full.
#[derive(Debug, Clone)]
pub struct RequestHistory {
    entries: VecDeque<RequestEntry>,
    capacity: usize,
}

impl RequestHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: RequestEntry) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RequestEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&RequestEntry> {
        self.entries.back()
    }
}

impl Default for RequestHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl Serialize for RequestHistory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(timestamp: u64) -> RequestEntry {
        RequestEntry {
            timestamp,
            endpoint: "/api/generate".into(),
            success: true,
        }
    }

    #[test]
    fn test_evicts_oldest() {
        let mut history = RequestHistory::with_capacity(3);
        for ts in 0..5 {
            history.push(entry(ts));
        }
        let kept: Vec<u64> = history.iter().map(|e| e.timestamp).collect();
        assert_eq!(kept, vec![2, 3, 4]);
        assert_eq!(history.latest().unwrap().timestamp, 4);
    }

    #[test]
    fn test_default_capacity_bound() {
        let mut history = RequestHistory::default();
        for ts in 0..150 {
            history.push(entry(ts));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.iter().next().unwrap().timestamp, 50);
    }

    #[test]
    fn test_serializes_as_list() {
        let mut history = RequestHistory::with_capacity(2);
        history.push(entry(1));
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json[0]["endpoint"], "/api/generate");
        assert_eq!(json.as_array().unwrap().len(), 1);
    }
}
