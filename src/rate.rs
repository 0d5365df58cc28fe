//! Reset-safe conversion of cumulative counters into rates.
//!
//! Every sampler that turns a monotonically increasing OS counter into a
//! rate goes through this module: CPU ticks into percentages, interface
//! bytes into bytes per second and per-process ticks into CPU percent.
//!
//! Rules applied on every update:
//! - first sample of a key yields 0 and becomes the baseline
//! - elapsed time of zero (or a clock that went backwards) yields 0
//! - a counter lower than its baseline (reset or wrap) yields 0
//!
//! In every case the new sample replaces the stored baseline.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use std::hash::Hash;
use std::time::Instant;

/// Difference between two cumulative readings, `None` on counter regression.
pub fn counter_delta(current: u64, previous: u64) -> Option<u64> {
    current.checked_sub(previous)
}

/// Maps NaN, infinities and negative values to zero.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// `part / total * 100`, zero when `total` is zero.
pub fn ratio_percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    finite_or_zero(part as f64 / total as f64 * 100.0)
}

/// Clamps a percentage into `[0, max]`.
pub fn clamp_percent(value: f64, max: f64) -> f64 {
    finite_or_zero(value).min(finite_or_zero(max))
}

/// Last accepted reading for one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterSample {
    pub value: u64,
    pub at: Instant,
}

/// Per-entity rate state keyed by a stable identity (core, interface, pid).
#[derive(Debug)]
pub struct RateCounter<K> {
    samples: HashMap<K, CounterSample>,
}

impl<K> Default for RateCounter<K> {
    fn default() -> Self {
        Self {
            samples: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> RateCounter<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` observed at `at` and returns the per-second rate
    /// since the previous reading of `key`.
    pub fn update(&mut self, key: K, value: u64, at: Instant) -> f64 {
        let previous = self.samples.insert(key, CounterSample { value, at });

        let Some(previous) = previous else {
            return 0.0;
        };

        let elapsed = match at.checked_duration_since(previous.at) {
            Some(d) => d.as_secs_f64(),
            None => return 0.0,
        };
        if elapsed <= 0.0 {
            return 0.0;
        }

        match counter_delta(value, previous.value) {
            Some(delta) => finite_or_zero(delta as f64 / elapsed),
            None => 0.0,
        }
    }

    /// Current baseline for `key`, if any.
    pub fn baseline(&self, key: &K) -> Option<CounterSample> {
        self.samples.get(key).copied()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.samples.contains_key(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<CounterSample> {
        self.samples.remove(key)
    }

    /// Drops every key not present in `live`. Returns the number purged.
    pub fn retain_keys(&mut self, live: &HashSet<K>) -> usize {
        let before = self.samples.len();
        self.samples.retain(|k, _| live.contains(k));
        before - self.samples.len()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
