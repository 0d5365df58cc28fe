//! History streams for every metric kind.
//!
//! One [`HistoryBuffer`] per [`MetricStream`], all with the same capacity,
//! held in a `DashMap` so readers never block the publishing side for long.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::history::{HistoryBuffer, HistoryPoint};

/// The time series kept by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStream {
    /// Total CPU usage percent.
    Cpu,
    /// Used memory percent, swap percent as secondary.
    Memory,
    /// Aggregate receive rate, transmit rate as secondary.
    Network,
    /// Utilization percent, memory percent as secondary.
    Gpu,
    /// Used percent across volumes.
    Disk,
    /// Summed normalized CPU of all processes, process count as secondary.
    Processes,
}

impl MetricStream {
    pub const ALL: [MetricStream; 6] = [
        MetricStream::Cpu,
        MetricStream::Memory,
        MetricStream::Network,
        MetricStream::Gpu,
        MetricStream::Disk,
        MetricStream::Processes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricStream::Cpu => "cpu",
            MetricStream::Memory => "memory",
            MetricStream::Network => "network",
            MetricStream::Gpu => "gpu",
            MetricStream::Disk => "disk",
            MetricStream::Processes => "processes",
        }
    }
}

impl fmt::Display for MetricStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricStream {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricStream::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown metric stream '{}'", s))
    }
}

/// Statistics about the history store.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryStats {
    pub capacity_per_stream: usize,
    pub interval_ms: u64,
    pub history_seconds: u64,
    pub streams: usize,
    pub total_points: usize,
}

pub struct HistoryStore {
    buffers: DashMap<MetricStream, HistoryBuffer<HistoryPoint>>,
    capacity: usize,
    interval_ms: u64,
}

impl HistoryStore {
    pub fn new(capacity: usize, interval_ms: u64) -> Self {
        Self {
            buffers: DashMap::new(),
            capacity: capacity.max(1),
            interval_ms,
        }
    }

    /// Appends a point, creating the stream's buffer on first use.
    pub fn record(&self, stream: MetricStream, point: HistoryPoint) {
        self.buffers
            .entry(stream)
            .or_insert_with(|| HistoryBuffer::new(self.capacity))
            .push(point);
    }

    /// Points of one stream, oldest first. Empty if nothing was recorded.
    pub fn history(&self, stream: MetricStream) -> Vec<HistoryPoint> {
        self.buffers
            .get(&stream)
            .map(|b| b.snapshot())
            .unwrap_or_default()
    }

    pub fn latest(&self, stream: MetricStream) -> Option<HistoryPoint> {
        self.buffers.get(&stream).and_then(|b| b.latest().copied())
    }

    pub fn len(&self, stream: MetricStream) -> usize {
        self.buffers.get(&stream).map(|b| b.len()).unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            capacity_per_stream: self.capacity,
            interval_ms: self.interval_ms,
            history_seconds: self.capacity as u64 * self.interval_ms / 1000,
            streams: self.buffers.len(),
            total_points: self.buffers.iter().map(|b| b.len()).sum(),
        }
    }
}
