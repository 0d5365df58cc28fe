//! Herakles Live Monitor Library
//!
//! Live system-resource telemetry for Linux. Samplers read cumulative
//! counters from `/proc` and `/sys` and turn them into rates, percentages and
//! bounded time series. A [`Monitor`] owns the samplers, runs them on a
//! tiered schedule and publishes the results for a dashboard or the bundled
//! HTTP API.
//!
//! # Features
//!
//! - **Reset-safe rates**: counter regressions and clock anomalies yield 0, never negative values
//! - **Tiered sampling**: cheap metrics every cycle, processes, disks and GPUs less often
//! - **Bounded history**: one ring buffer per metric stream
//! - **Validated process control**: signals are refused when a pid has been reused
//!
//! # Usage
//!
//! ```no_run
//! use herakles_live_monitor::{Monitor, MonitorConfig, MetricStream};
//!
//! # async fn run() {
//! let monitor = Monitor::new(MonitorConfig::default());
//! monitor.start().await;
//!
//! if let Some(cpu) = monitor.cpu() {
//!     println!("CPU: {:.1}%", cpu.usage_percent);
//! }
//! for point in monitor.history(MetricStream::Network) {
//!     println!("{} rx={} B/s", point.timestamp, point.value);
//! }
//!
//! monitor.stop().await;
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `nvml`: query NVIDIA GPUs through NVML in addition to DRM sysfs

pub mod collectors;
pub mod error;
pub mod history;
pub mod history_store;
pub mod monitor;
pub mod process;
pub mod rate;
pub mod sampler_stats;
pub mod scheduler;
pub mod snapshot;
pub mod system;

// Re-export main types for convenience
pub use error::{ControlError, SampleError, SampleResult};
pub use history::{HistoryBuffer, HistoryPoint};
pub use history_store::{HistoryStats, MetricStream};
pub use monitor::{LatestSnapshots, Monitor, MonitorConfig, MonitorState, SamplerSet};
pub use process::{ControlAction, ControlOutcome, ProcessController};
pub use rate::RateCounter;
pub use scheduler::{CyclePlan, SamplerKind, SchedulerConfig, TieredScheduler};
pub use snapshot::ControlToken;
