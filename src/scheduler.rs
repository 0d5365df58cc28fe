//! Multi-cadence cycle planning.
//!
//! CPU, memory and network are sampled every cycle. Processes are sampled
//! every `process_every_cycles` cycles (the process sampler then applies its
//! own full/lightweight tiering), disk and GPU every `slow_every_cycles`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::history_store::MetricStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
    Cpu,
    Memory,
    Network,
    Processes,
    Disk,
    Gpu,
}

impl SamplerKind {
    pub const ALL: [SamplerKind; 6] = [
        SamplerKind::Cpu,
        SamplerKind::Memory,
        SamplerKind::Network,
        SamplerKind::Processes,
        SamplerKind::Disk,
        SamplerKind::Gpu,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SamplerKind::Cpu => "cpu",
            SamplerKind::Memory => "memory",
            SamplerKind::Network => "network",
            SamplerKind::Processes => "processes",
            SamplerKind::Disk => "disk",
            SamplerKind::Gpu => "gpu",
        }
    }

    /// The history stream this sampler feeds.
    pub fn stream(self) -> MetricStream {
        match self {
            SamplerKind::Cpu => MetricStream::Cpu,
            SamplerKind::Memory => MetricStream::Memory,
            SamplerKind::Network => MetricStream::Network,
            SamplerKind::Processes => MetricStream::Processes,
            SamplerKind::Disk => MetricStream::Disk,
            SamplerKind::Gpu => MetricStream::Gpu,
        }
    }
}

impl fmt::Display for SamplerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub process_every_cycles: u64,
    pub slow_every_cycles: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            process_every_cycles: 2,
            slow_every_cycles: 3,
        }
    }
}

/// The samplers to run in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePlan {
    /// 0 for the baseline pass.
    pub cycle: u64,
    pub samplers: Vec<SamplerKind>,
    /// Baseline results only seed delta state and are never published.
    pub baseline: bool,
}

impl CyclePlan {
    pub fn contains(&self, kind: SamplerKind) -> bool {
        self.samplers.contains(&kind)
    }
}

#[derive(Debug, Clone)]
pub struct TieredScheduler {
    config: SchedulerConfig,
    cycle: u64,
}

impl TieredScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config, cycle: 0 }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Every sampler, run once on start.
    pub fn baseline_plan(&self) -> CyclePlan {
        CyclePlan {
            cycle: 0,
            samplers: SamplerKind::ALL.to_vec(),
            baseline: true,
        }
    }

    /// Advances the cycle counter and returns the plan for the new cycle.
    pub fn next_plan(&mut self) -> CyclePlan {
        self.cycle += 1;
        let cycle = self.cycle;
        let due = |every: u64| cycle % every.max(1) == 0;

        let mut samplers = vec![SamplerKind::Cpu, SamplerKind::Memory, SamplerKind::Network];
        if due(self.config.process_every_cycles) {
            samplers.push(SamplerKind::Processes);
        }
        if due(self.config.slow_every_cycles) {
            samplers.push(SamplerKind::Disk);
            samplers.push(SamplerKind::Gpu);
        }

        CyclePlan {
            cycle,
            samplers,
            baseline: false,
        }
    }
}

impl Default for TieredScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
