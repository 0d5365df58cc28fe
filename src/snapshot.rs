//! Immutable snapshot values produced by the samplers.
//!
//! Each snapshot is created once per sample and carries its capture
//! timestamp. Rate and percentage fields are always finite and non-negative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rate::ratio_percent;

/// Classification of a logical core on heterogeneous hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreKind {
    Performance,
    Efficiency,
    Unknown,
}

/// Core layout detected once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuTopology {
    pub logical_cores: usize,
    pub performance_cores: usize,
    pub efficiency_cores: usize,
    pub heterogeneous: bool,
    pub architecture: String,
}

impl CpuTopology {
    /// Topology without a performance/efficiency split.
    pub fn uniform(logical_cores: usize) -> Self {
        Self {
            logical_cores,
            performance_cores: 0,
            efficiency_cores: 0,
            heterogeneous: false,
            architecture: std::env::consts::ARCH.to_string(),
        }
    }

    /// Kind of the core at `index`. The first `performance_cores` cores are
    /// performance cores when a split was detected.
    pub fn kind_of(&self, index: usize) -> CoreKind {
        if !self.heterogeneous {
            CoreKind::Unknown
        } else if index < self.performance_cores {
            CoreKind::Performance
        } else {
            CoreKind::Efficiency
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreUsage {
    pub index: usize,
    pub kind: CoreKind,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuSnapshot {
    pub captured_at: DateTime<Utc>,
    pub usage_percent: f64,
    pub user_percent: f64,
    pub system_percent: f64,
    pub idle_percent: f64,
    pub cores: Vec<CoreUsage>,
    pub performance_usage_percent: Option<f64>,
    pub efficiency_usage_percent: Option<f64>,
}

/// Coarse memory pressure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPressure {
    Nominal,
    Warning,
    Critical,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySnapshot {
    pub captured_at: DateTime<Utc>,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub active_bytes: u64,
    pub inactive_bytes: u64,
    pub wired_bytes: u64,
    pub compressed_bytes: u64,
    pub cached_bytes: u64,
    pub used_bytes: u64,
    pub swap_total_bytes: u64,
    pub swap_used_bytes: u64,
    pub pressure: MemoryPressure,
}

impl MemorySnapshot {
    pub fn used_percent(&self) -> f64 {
        ratio_percent(self.used_bytes, self.total_bytes)
    }

    pub fn swap_used_percent(&self) -> f64 {
        ratio_percent(self.swap_used_bytes, self.swap_total_bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceSnapshot {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSnapshot {
    pub captured_at: DateTime<Utc>,
    /// Sorted by interface name.
    pub interfaces: Vec<InterfaceSnapshot>,
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
}

/// Accelerator memory architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpuKind {
    UnifiedMemory,
    Discrete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuSnapshot {
    pub captured_at: DateTime<Utc>,
    pub name: String,
    pub kind: GpuKind,
    pub utilization_percent: Option<f64>,
    pub memory_used_bytes: Option<u64>,
    pub memory_total_bytes: Option<u64>,
    /// VRAM usage on discrete devices, system memory usage on unified ones.
    pub memory_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeSnapshot {
    pub device: String,
    pub mount_point: String,
    pub fstype: String,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
    pub is_removable: bool,
    pub is_internal: bool,
}

impl VolumeSnapshot {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskSnapshot {
    pub captured_at: DateTime<Utc>,
    pub volumes: Vec<VolumeSnapshot>,
}

impl DiskSnapshot {
    /// Used share of all reported volumes combined.
    pub fn used_percent(&self) -> f64 {
        let total: u64 = self.volumes.iter().map(|v| v.total_bytes).sum();
        let used: u64 = self.volumes.iter().map(|v| v.used_bytes()).sum();
        ratio_percent(used, total)
    }
}

/// Lifecycle state shown for a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Running,
    Sleeping,
    Stopped,
    Zombie,
    Unknown,
}

/// The caller's belief about which process a pid refers to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlToken {
    pub pid: u32,
    pub expected_start_time: Option<f64>,
}

impl ControlToken {
    pub fn new(pid: u32, expected_start_time: Option<f64>) -> Self {
        Self {
            pid,
            expected_start_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub name: String,
    pub user: String,
    /// 100 = one core saturated.
    pub cpu_percent: f64,
    /// 100 = every core saturated.
    pub normalized_cpu_percent: f64,
    pub memory_bytes: u64,
    pub threads: u32,
    pub state: ProcessState,
    pub parent_pid: u32,
    /// Seconds since the Unix epoch.
    pub start_time: f64,
    pub icon: Option<String>,
    /// Set when only identity fields could be read.
    pub limited: bool,
}

impl ProcessSnapshot {
    pub fn token(&self) -> ControlToken {
        ControlToken::new(self.pid, Some(self.start_time))
    }
}

/// Which fields a process sample refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTier {
    Full,
    Lightweight,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessList {
    pub captured_at: DateTime<Utc>,
    pub tier: RefreshTier,
    pub processes: Vec<ProcessSnapshot>,
}

/// Ordering for process listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessSortKey {
    #[default]
    Cpu,
    Memory,
    Name,
    Pid,
}

impl ProcessList {
    /// Sorts CPU and memory descending, name and pid ascending. Ties are
    /// broken by pid.
    pub fn sort_by(&mut self, key: ProcessSortKey) {
        self.processes.sort_by(|a, b| {
            let primary = match key {
                ProcessSortKey::Cpu => b.cpu_percent.total_cmp(&a.cpu_percent),
                ProcessSortKey::Memory => b.memory_bytes.cmp(&a.memory_bytes),
                ProcessSortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                ProcessSortKey::Pid => std::cmp::Ordering::Equal,
            };
            primary.then(a.pid.cmp(&b.pid))
        });
    }

    pub fn find(&self, pid: u32) -> Option<&ProcessSnapshot> {
        self.processes.iter().find(|p| p.pid == pid)
    }

    pub fn total_normalized_cpu(&self) -> f64 {
        self.processes
            .iter()
            .map(|p| p.normalized_cpu_percent)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_kind_of() {
        let topo = CpuTopology {
            logical_cores: 8,
            performance_cores: 4,
            efficiency_cores: 4,
            heterogeneous: true,
            architecture: "x86_64".into(),
        };
        assert_eq!(topo.kind_of(0), CoreKind::Performance);
        assert_eq!(topo.kind_of(3), CoreKind::Performance);
        assert_eq!(topo.kind_of(4), CoreKind::Efficiency);

        let uniform = CpuTopology::uniform(8);
        assert_eq!(uniform.kind_of(0), CoreKind::Unknown);
    }

    #[test]
    fn test_disk_used_percent() {
        let volume = |total, free| VolumeSnapshot {
            device: "/dev/sda1".into(),
            mount_point: "/".into(),
            fstype: "ext4".into(),
            total_bytes: total,
            free_bytes: free,
            available_bytes: free,
            is_removable: false,
            is_internal: true,
        };
        let snap = DiskSnapshot {
            captured_at: Utc::now(),
            volumes: vec![volume(100, 50), volume(300, 50)],
        };
        assert!((snap.used_percent() - 75.0).abs() < 1e-9);

        let empty = DiskSnapshot {
            captured_at: Utc::now(),
            volumes: Vec::new(),
        };
        assert_eq!(empty.used_percent(), 0.0);
    }

    fn process(pid: u32, name: &str, cpu: f64, memory: u64) -> ProcessSnapshot {
        ProcessSnapshot {
            pid,
            name: name.into(),
            user: "root".into(),
            cpu_percent: cpu,
            normalized_cpu_percent: cpu / 4.0,
            memory_bytes: memory,
            threads: 1,
            state: ProcessState::Sleeping,
            parent_pid: 1,
            start_time: 1_700_000_000.0,
            icon: None,
            limited: false,
        }
    }

    #[test]
    fn test_process_list_sorting() {
        let mut list = ProcessList {
            captured_at: Utc::now(),
            tier: RefreshTier::Full,
            processes: vec![
                process(30, "zsh", 5.0, 10),
                process(10, "Bash", 50.0, 30),
                process(20, "cargo", 50.0, 20),
            ],
        };

        list.sort_by(ProcessSortKey::Cpu);
        let pids: Vec<u32> = list.processes.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![10, 20, 30]);

        list.sort_by(ProcessSortKey::Memory);
        let pids: Vec<u32> = list.processes.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![10, 20, 30]);

        list.sort_by(ProcessSortKey::Name);
        let names: Vec<&str> = list.processes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Bash", "cargo", "zsh"]);

        assert_eq!(list.find(20).map(|p| p.name.as_str()), Some("cargo"));
        assert!((list.total_normalized_cpu() - 26.25).abs() < 1e-9);
    }
}
