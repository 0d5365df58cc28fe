//! Global and per-core CPU usage from /proc/stat.
//!
//! Linux exposes eight tick categories per CPU line; they are folded into
//! the four categories the usage computation works with:
//! `system` absorbs irq, softirq and steal, `idle` absorbs iowait.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::collectors::Sampler;
use crate::error::{SampleError, SampleResult};
use crate::rate::{clamp_percent, counter_delta, ratio_percent};
use crate::snapshot::{CoreKind, CoreUsage, CpuSnapshot, CpuTopology};
use crate::system::{self, read_attr, read_attr_u64};

/// Cumulative tick counters for one CPU line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub user: u64,
    pub system: u64,
    pub idle: u64,
    pub nice: u64,
}

impl CpuTicks {
    pub fn new(user: u64, system: u64, idle: u64, nice: u64) -> Self {
        Self {
            user,
            system,
            idle,
            nice,
        }
    }

    pub fn total(&self) -> u64 {
        self.user + self.system + self.idle + self.nice
    }

    /// Per-category difference, `None` if any category went backwards.
    fn delta(&self, previous: &CpuTicks) -> Option<CpuTicks> {
        Some(CpuTicks {
            user: counter_delta(self.user, previous.user)?,
            system: counter_delta(self.system, previous.system)?,
            idle: counter_delta(self.idle, previous.idle)?,
            nice: counter_delta(self.nice, previous.nice)?,
        })
    }
}

/// One complete read of /proc/stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuReading {
    pub total: CpuTicks,
    pub cores: Vec<CpuTicks>,
}

/// Usage split derived from two readings of one CPU line.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Usage {
    usage: f64,
    user: f64,
    system: f64,
    idle: f64,
}

/// Computes usage between two readings; cold start and resets yield zero.
fn usage_between(current: &CpuTicks, previous: Option<&CpuTicks>) -> Usage {
    let Some(previous) = previous else {
        return Usage::default();
    };
    let Some(delta) = current.delta(previous) else {
        return Usage::default();
    };

    let total = delta.total();
    Usage {
        usage: clamp_percent(ratio_percent(delta.user + delta.system, total), 100.0),
        user: clamp_percent(ratio_percent(delta.user, total), 100.0),
        system: clamp_percent(ratio_percent(delta.system, total), 100.0),
        idle: clamp_percent(ratio_percent(delta.idle, total), 100.0),
    }
}

fn parse_cpu_line(line: &str) -> SampleResult<CpuTicks> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return Err(SampleError::parse(
            "/proc/stat",
            format!("cpu line has {} fields", fields.len()),
        ));
    }

    let mut values = [0u64; 8];
    for (slot, raw) in values.iter_mut().zip(fields[1..].iter()) {
        *slot = raw
            .parse()
            .map_err(|_| SampleError::parse("/proc/stat", format!("bad tick value '{}'", raw)))?;
    }
    let [user, nice, system, idle, iowait, irq, softirq, steal] = values;

    Ok(CpuTicks {
        user,
        nice,
        system: system + irq + softirq + steal,
        idle: idle + iowait,
    })
}

/// Parses the aggregate and per-core lines of /proc/stat.
///
/// Any malformed line fails the whole read: a partial reading is never
/// reported.
pub fn parse_proc_stat(content: &str) -> SampleResult<CpuReading> {
    let mut total = None;
    let mut cores = Vec::new();

    for line in content.lines() {
        let Some(rest) = line.strip_prefix("cpu") else {
            continue;
        };
        if rest.starts_with(' ') {
            total = Some(parse_cpu_line(line)?);
        } else if rest.starts_with(|c: char| c.is_ascii_digit()) {
            cores.push(parse_cpu_line(line)?);
        }
    }

    let total = total.ok_or_else(|| SampleError::parse("/proc/stat", "missing aggregate cpu line"))?;
    if cores.is_empty() {
        return Err(SampleError::parse("/proc/stat", "no per-core lines"));
    }

    Ok(CpuReading { total, cores })
}

/// Parses a sysfs cpulist such as `0-3,8,10-11` into core indices.
pub fn parse_cpulist(list: &str) -> Vec<usize> {
    let mut out = Vec::new();
    for part in list.trim().split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((a, b)) => {
                if let (Ok(a), Ok(b)) = (a.trim().parse::<usize>(), b.trim().parse::<usize>()) {
                    out.extend(a..=b);
                }
            }
            None => {
                if let Ok(v) = part.trim().parse() {
                    out.push(v);
                }
            }
        }
    }
    out
}

/// Detects a performance/efficiency split.
///
/// Intel hybrid parts expose `cpu_core` and `cpu_atom` PMUs with their
/// cpulists; ARM big.LITTLE systems expose differing `cpu_capacity` values.
pub fn detect_topology(sys_root: &Path, logical_cores: usize) -> CpuTopology {
    let devices = sys_root.join("devices");

    let p_cores = read_attr(&devices.join("cpu_core").join("cpus")).map(|l| parse_cpulist(&l).len());
    let e_cores = read_attr(&devices.join("cpu_atom").join("cpus")).map(|l| parse_cpulist(&l).len());
    if let (Some(p), Some(e)) = (p_cores, e_cores) {
        if p > 0 && e > 0 {
            return CpuTopology {
                logical_cores,
                performance_cores: p,
                efficiency_cores: e,
                heterogeneous: true,
                architecture: std::env::consts::ARCH.to_string(),
            };
        }
    }

    let capacities: Vec<u64> = (0..logical_cores)
        .filter_map(|i| {
            read_attr_u64(
                &devices
                    .join("system")
                    .join("cpu")
                    .join(format!("cpu{}", i))
                    .join("cpu_capacity"),
            )
        })
        .collect();
    if capacities.len() == logical_cores {
        if let Some(&max) = capacities.iter().max() {
            let p = capacities.iter().filter(|&&c| c == max).count();
            if p < logical_cores {
                return CpuTopology {
                    logical_cores,
                    performance_cores: p,
                    efficiency_cores: logical_cores - p,
                    heterogeneous: true,
                    architecture: std::env::consts::ARCH.to_string(),
                };
            }
        }
    }

    CpuTopology::uniform(logical_cores)
}

/// Stateful sampler for global and per-core CPU usage.
pub struct CpuSampler {
    proc_root: PathBuf,
    topology: CpuTopology,
    previous_total: Option<CpuTicks>,
    previous_cores: Vec<CpuTicks>,
}

impl CpuSampler {
    /// Creates a sampler reading `<proc_root>/stat` and detects the topology
    /// under `sys_root`.
    pub fn new(proc_root: impl Into<PathBuf>, sys_root: &Path) -> Self {
        let proc_root = proc_root.into();
        let logical = system::read_file(&proc_root.join("stat"))
            .and_then(|c| parse_proc_stat(&c))
            .map(|r| r.cores.len())
            .unwrap_or_else(|_| system::online_cores());
        let topology = detect_topology(sys_root, logical);
        Self::with_topology(proc_root, topology)
    }

    pub fn with_topology(proc_root: impl Into<PathBuf>, topology: CpuTopology) -> Self {
        Self {
            proc_root: proc_root.into(),
            topology,
            previous_total: None,
            previous_cores: Vec::new(),
        }
    }

    pub fn topology(&self) -> &CpuTopology {
        &self.topology
    }

    /// Applies a reading against the stored baselines.
    pub fn apply(&mut self, reading: CpuReading) -> CpuSnapshot {
        let global = usage_between(&reading.total, self.previous_total.as_ref());

        let cores: Vec<CoreUsage> = reading
            .cores
            .iter()
            .enumerate()
            .map(|(index, ticks)| CoreUsage {
                index,
                kind: self.topology.kind_of(index),
                usage_percent: usage_between(ticks, self.previous_cores.get(index)).usage,
            })
            .collect();

        let average_of = |kind: CoreKind| {
            let values: Vec<f64> = cores
                .iter()
                .filter(|c| c.kind == kind)
                .map(|c| c.usage_percent)
                .collect();
            (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
        };

        let snapshot = CpuSnapshot {
            captured_at: Utc::now(),
            usage_percent: global.usage,
            user_percent: global.user,
            system_percent: global.system,
            idle_percent: global.idle,
            performance_usage_percent: average_of(CoreKind::Performance),
            efficiency_usage_percent: average_of(CoreKind::Efficiency),
            cores,
        };

        self.previous_total = Some(reading.total);
        self.previous_cores = reading.cores;

        snapshot
    }
}

impl Sampler for CpuSampler {
    type Output = CpuSnapshot;

    fn sample(&mut self) -> SampleResult<CpuSnapshot> {
        let content = system::read_file(&self.proc_root.join("stat"))?;
        let reading = parse_proc_stat(&content)?;
        let snapshot = self.apply(reading);
        debug!(
            "CPU sample: {:.1}% across {} cores",
            snapshot.usage_percent,
            snapshot.cores.len()
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // -------------------------------------------------------------------------
    // Tests for parse_proc_stat
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_proc_stat_folds_categories() {
        let content = "cpu  100 5 50 800 20 3 2 1 0 0\n\
                       cpu0 60 5 30 400 10 2 1 1 0 0\n\
                       cpu1 40 0 20 400 10 1 1 0 0 0\n\
                       intr 12345\n\
                       btime 1700000000\n";
        let reading = parse_proc_stat(content).unwrap();
        assert_eq!(reading.cores.len(), 2);
        assert_eq!(reading.total, CpuTicks::new(100, 56, 820, 5));
        assert_eq!(reading.cores[1], CpuTicks::new(40, 22, 410, 0));
    }

    #[test]
    fn test_parse_proc_stat_rejects_partial_core_line() {
        let content = "cpu  100 5 50 800 20 3 2 1\ncpu0 60 5 x 400\n";
        assert!(parse_proc_stat(content).is_err());
    }

    #[test]
    fn test_parse_proc_stat_requires_aggregate() {
        assert!(parse_proc_stat("cpu0 1 2 3 4 5 6 7 8\n").is_err());
    }

    #[test]
    fn test_parse_cpulist() {
        assert_eq!(parse_cpulist("0-3,8,10-11\n"), vec![0, 1, 2, 3, 8, 10, 11]);
        assert_eq!(parse_cpulist(""), Vec::<usize>::new());
    }

    // -------------------------------------------------------------------------
    // Tests for CpuSampler::apply
    // -------------------------------------------------------------------------

    fn reading(ticks: CpuTicks, cores: usize) -> CpuReading {
        CpuReading {
            total: ticks,
            cores: vec![ticks; cores],
        }
    }

    #[test]
    fn test_first_sample_is_zero_baseline() {
        let mut sampler = CpuSampler::with_topology("/nonexistent", CpuTopology::uniform(2));
        let snap = sampler.apply(reading(CpuTicks::new(100, 50, 850, 0), 2));
        assert_eq!(snap.usage_percent, 0.0);
        assert!(snap.cores.iter().all(|c| c.usage_percent == 0.0));
    }

    #[test]
    fn test_usage_between_two_readings() {
        let mut sampler = CpuSampler::with_topology("/nonexistent", CpuTopology::uniform(1));
        sampler.apply(reading(CpuTicks::new(100, 50, 850, 0), 1));
        let snap = sampler.apply(reading(CpuTicks::new(150, 70, 890, 0), 1));

        // 70 busy ticks out of 110
        assert!((snap.usage_percent - 63.636).abs() < 0.01);
        assert!((snap.user_percent - 45.454).abs() < 0.01);
        assert!((snap.idle_percent - 36.363).abs() < 0.01);
        assert!((snap.cores[0].usage_percent - 63.636).abs() < 0.01);
    }

    #[test]
    fn test_counter_reset_yields_zero() {
        let mut sampler = CpuSampler::with_topology("/nonexistent", CpuTopology::uniform(1));
        sampler.apply(reading(CpuTicks::new(1000, 500, 8000, 0), 1));
        let snap = sampler.apply(reading(CpuTicks::new(10, 5, 80, 0), 1));
        assert_eq!(snap.usage_percent, 0.0);

        let snap = sampler.apply(reading(CpuTicks::new(20, 15, 80, 0), 1));
        assert!((snap.usage_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_partitions_heterogeneous_cores() {
        let topology = CpuTopology {
            logical_cores: 4,
            performance_cores: 2,
            efficiency_cores: 2,
            heterogeneous: true,
            architecture: "x86_64".into(),
        };
        let mut sampler = CpuSampler::with_topology("/nonexistent", topology);
        let base = CpuTicks::new(0, 0, 0, 0);
        sampler.apply(reading(base, 4));

        let busy = CpuTicks::new(50, 50, 0, 0);
        let idle = CpuTicks::new(0, 0, 100, 0);
        let snap = sampler.apply(CpuReading {
            total: CpuTicks::new(100, 100, 200, 0),
            cores: vec![busy, busy, idle, idle],
        });

        assert_eq!(snap.cores[0].kind, CoreKind::Performance);
        assert_eq!(snap.cores[3].kind, CoreKind::Efficiency);
        assert_eq!(snap.performance_usage_percent, Some(100.0));
        assert_eq!(snap.efficiency_usage_percent, Some(0.0));
    }

    // -------------------------------------------------------------------------
    // Tests for detect_topology
    // -------------------------------------------------------------------------

    #[test]
    fn test_detect_intel_hybrid() {
        let dir = tempdir().expect("Failed to create temp dir");
        let devices = dir.path().join("devices");
        std::fs::create_dir_all(devices.join("cpu_core")).unwrap();
        std::fs::create_dir_all(devices.join("cpu_atom")).unwrap();
        std::fs::write(devices.join("cpu_core").join("cpus"), "0-7\n").unwrap();
        std::fs::write(devices.join("cpu_atom").join("cpus"), "8-15\n").unwrap();

        let topo = detect_topology(dir.path(), 16);
        assert!(topo.heterogeneous);
        assert_eq!(topo.performance_cores, 8);
        assert_eq!(topo.efficiency_cores, 8);
    }

    #[test]
    fn test_detect_capacity_split() {
        let dir = tempdir().expect("Failed to create temp dir");
        for (i, cap) in [1024, 1024, 512, 512].iter().enumerate() {
            let cpu = dir
                .path()
                .join("devices/system/cpu")
                .join(format!("cpu{}", i));
            std::fs::create_dir_all(&cpu).unwrap();
            std::fs::write(cpu.join("cpu_capacity"), format!("{}\n", cap)).unwrap();
        }

        let topo = detect_topology(dir.path(), 4);
        assert!(topo.heterogeneous);
        assert_eq!(topo.performance_cores, 2);
        assert_eq!(topo.efficiency_cores, 2);
    }

    #[test]
    fn test_detect_uniform_when_no_hints() {
        let dir = tempdir().expect("Failed to create temp dir");
        let topo = detect_topology(dir.path(), 4);
        assert!(!topo.heterogeneous);
        assert_eq!(topo.logical_cores, 4);
    }
}
