//! Per-sampler run statistics.
//!
//! Counts successes, failures and cycles skipped because the sampler was
//! still busy, plus running duration statistics. Rendered by `/health`.

use serde::Serialize;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::Instant;

use crate::scheduler::SamplerKind;

/// Running statistics for a single metric.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunningStat {
    pub count: u64,
    sum: f64,
    pub min: f64,
    pub max: f64,
    pub last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    pub fn snapshot(&self) -> RunningStat {
        self.inner.lock().map(|s| *s).unwrap_or_default()
    }
}

/// Counters for one sampler.
#[derive(Default)]
pub struct SamplerCounters {
    pub successes: AtomicU64,
    pub failures: AtomicU64,
    pub skipped_busy: AtomicU64,
    pub duration_ms: Stat,
    last_error: StdRwLock<Option<String>>,
    last_success: StdRwLock<Option<Instant>>,
}

/// Serializable view of [`SamplerCounters`].
#[derive(Debug, Clone, Serialize)]
pub struct SamplerStatsSnapshot {
    pub sampler: SamplerKind,
    pub successes: u64,
    pub failures: u64,
    pub skipped_busy: u64,
    pub last_duration_ms: f64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: f64,
    pub seconds_since_success: Option<f64>,
    pub last_error: Option<String>,
}

pub struct SamplerStats {
    counters: [SamplerCounters; 6],
    start_time: Instant,
}

impl Default for SamplerStats {
    fn default() -> Self {
        Self {
            counters: Default::default(),
            start_time: Instant::now(),
        }
    }
}

fn slot(kind: SamplerKind) -> usize {
    match kind {
        SamplerKind::Cpu => 0,
        SamplerKind::Memory => 1,
        SamplerKind::Network => 2,
        SamplerKind::Processes => 3,
        SamplerKind::Disk => 4,
        SamplerKind::Gpu => 5,
    }
}

impl SamplerStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn counters(&self, kind: SamplerKind) -> &SamplerCounters {
        &self.counters[slot(kind)]
    }

    pub fn record_success(&self, kind: SamplerKind, duration_ms: f64) {
        let c = self.counters(kind);
        c.successes.fetch_add(1, Ordering::Relaxed);
        c.duration_ms.add_sample(duration_ms);
        if let Ok(mut guard) = c.last_success.write() {
            *guard = Some(Instant::now());
        }
    }

    pub fn record_failure(&self, kind: SamplerKind, duration_ms: f64, error: &str) {
        let c = self.counters(kind);
        c.failures.fetch_add(1, Ordering::Relaxed);
        c.duration_ms.add_sample(duration_ms);
        if let Ok(mut guard) = c.last_error.write() {
            *guard = Some(error.to_string());
        }
    }

    pub fn record_skipped_busy(&self, kind: SamplerKind) {
        self.counters(kind)
            .skipped_busy
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn snapshot(&self, kind: SamplerKind) -> SamplerStatsSnapshot {
        let c = self.counters(kind);
        let duration = c.duration_ms.snapshot();
        SamplerStatsSnapshot {
            sampler: kind,
            successes: c.successes.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            skipped_busy: c.skipped_busy.load(Ordering::Relaxed),
            last_duration_ms: duration.last,
            avg_duration_ms: duration.avg(),
            max_duration_ms: duration.max,
            seconds_since_success: c
                .last_success
                .read()
                .ok()
                .and_then(|g| g.map(|t| t.elapsed().as_secs_f64())),
            last_error: c.last_error.read().ok().and_then(|g| g.clone()),
        }
    }

    pub fn snapshot_all(&self) -> Vec<SamplerStatsSnapshot> {
        SamplerKind::ALL.iter().map(|k| self.snapshot(*k)).collect()
    }

    /// True once every always-on sampler has succeeded at least once.
    pub fn core_samplers_healthy(&self) -> bool {
        [SamplerKind::Cpu, SamplerKind::Memory, SamplerKind::Network]
            .iter()
            .all(|k| self.counters(*k).successes.load(Ordering::Relaxed) > 0)
    }

    pub fn render_table(&self) -> String {
        let mut out = String::new();
        writeln!(out, "SAMPLERS").ok();
        writeln!(out, "========").ok();
        writeln!(out).ok();
        writeln!(
            out,
            "{:<10} {:>8} {:>8} {:>8} {:>10} {:>10} {:>10}",
            "sampler", "ok", "failed", "busy", "last(ms)", "avg(ms)", "max(ms)"
        )
        .ok();
        for s in self.snapshot_all() {
            writeln!(
                out,
                "{:<10} {:>8} {:>8} {:>8} {:>10.2} {:>10.2} {:>10.2}",
                s.sampler.as_str(),
                s.successes,
                s.failures,
                s.skipped_busy,
                s.last_duration_ms,
                s.avg_duration_ms,
                s.max_duration_ms
            )
            .ok();
        }
        let errors: Vec<_> = self
            .snapshot_all()
            .into_iter()
            .filter_map(|s| s.last_error.map(|e| (s.sampler, e)))
            .collect();
        if !errors.is_empty() {
            writeln!(out).ok();
            writeln!(out, "Last errors:").ok();
            for (kind, err) in errors {
                writeln!(out, "  {}: {}", kind, err).ok();
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stat() {
        let mut s = RunningStat::default();
        assert_eq!(s.avg(), 0.0);
        s.add(4.0);
        s.add(2.0);
        s.add(6.0);
        assert_eq!(s.count, 3);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 6.0);
        assert_eq!(s.last, 6.0);
        assert!((s.avg() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_and_snapshot() {
        let stats = SamplerStats::new();
        assert!(!stats.core_samplers_healthy());

        stats.record_success(SamplerKind::Cpu, 1.5);
        stats.record_success(SamplerKind::Memory, 0.5);
        stats.record_success(SamplerKind::Network, 0.7);
        stats.record_failure(SamplerKind::Gpu, 0.1, "gpu device not available");
        stats.record_skipped_busy(SamplerKind::Processes);

        assert!(stats.core_samplers_healthy());
        let cpu = stats.snapshot(SamplerKind::Cpu);
        assert_eq!(cpu.successes, 1);
        assert!(cpu.seconds_since_success.is_some());

        let gpu = stats.snapshot(SamplerKind::Gpu);
        assert_eq!(gpu.failures, 1);
        assert_eq!(gpu.last_error.as_deref(), Some("gpu device not available"));
        assert_eq!(stats.snapshot(SamplerKind::Processes).skipped_busy, 1);

        let table = stats.render_table();
        assert!(table.contains("SAMPLERS"));
        assert!(table.contains("gpu: gpu device not available"));
    }
}
