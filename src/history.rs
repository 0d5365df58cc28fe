//! Bounded history buffers.
//!
//! A fixed-capacity circular buffer: once full, each push overwrites the
//! oldest entry. Entries are always read back in insertion order.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::rate::finite_or_zero;

/// Default number of points kept per stream.
pub const DEFAULT_HISTORY_CAPACITY: usize = 60;

/// One point of a metric time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<f64>,
}

impl HistoryPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value: finite_or_zero(value),
            secondary: None,
        }
    }

    pub fn with_secondary(timestamp: DateTime<Utc>, value: f64, secondary: f64) -> Self {
        Self {
            timestamp,
            value: finite_or_zero(value),
            secondary: Some(finite_or_zero(secondary)),
        }
    }
}

/// A circular buffer for storing entries with fixed capacity.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    entries: Vec<T>,
    capacity: usize,
    write_index: usize,
}

impl<T: Clone> HistoryBuffer<T> {
    /// Creates a buffer holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            write_index: 0,
        }
    }

    /// Pushes a new entry, overwriting the oldest one when full.
    pub fn push(&mut self, entry: T) {
        if self.entries.len() < self.capacity {
            self.entries.push(entry);
        } else {
            self.entries[self.write_index] = entry;
        }
        self.write_index = (self.write_index + 1) % self.capacity;
    }

    /// Returns all entries in chronological order (oldest to newest).
    pub fn snapshot(&self) -> Vec<T> {
        if self.entries.len() < self.capacity {
            return self.entries.clone();
        }
        let mut result = Vec::with_capacity(self.capacity);
        result.extend_from_slice(&self.entries[self.write_index..]);
        result.extend_from_slice(&self.entries[..self.write_index]);
        result
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&T> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = (self.write_index + self.capacity - 1) % self.capacity;
        self.entries.get(idx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.write_index = 0;
    }
}

impl<T: Clone> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
