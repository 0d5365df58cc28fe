//! Virtual memory statistics from /proc/vmstat, /proc/meminfo and PSI.
//!
//! Page counters are multiplied by the page size. The sampler is stateless
//! across cycles.

use ahash::AHashMap as HashMap;
use chrono::Utc;
use std::path::PathBuf;
use tracing::debug;

use crate::collectors::Sampler;
use crate::error::{SampleError, SampleResult};
use crate::snapshot::{MemoryPressure, MemorySnapshot};
use crate::system::{self, meminfo_bytes, PAGE_SIZE};

/// PSI `full avg10` at or above this is critical.
const PRESSURE_CRITICAL_FULL_AVG10: f64 = 5.0;
/// PSI `some avg10` at or above this is a warning.
const PRESSURE_WARNING_SOME_AVG10: f64 = 10.0;

/// Parses /proc/vmstat into a name → value map.
pub fn parse_vmstat(content: &str) -> HashMap<String, u64> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            let value = parts.next()?.parse().ok()?;
            Some((name.to_string(), value))
        })
        .collect()
}

fn psi_avg10(content: &str, kind: &str) -> Option<f64> {
    let line = content.lines().find(|l| l.starts_with(kind))?;
    line.split_whitespace()
        .find_map(|part| part.strip_prefix("avg10="))
        .and_then(|v| v.parse().ok())
}

/// Classifies /proc/pressure/memory content.
pub fn classify_pressure(psi: Option<&str>) -> MemoryPressure {
    let Some(content) = psi else {
        return MemoryPressure::Unknown;
    };
    match (psi_avg10(content, "some"), psi_avg10(content, "full")) {
        (_, Some(full)) if full >= PRESSURE_CRITICAL_FULL_AVG10 => MemoryPressure::Critical,
        (Some(some), _) if some >= PRESSURE_WARNING_SOME_AVG10 => MemoryPressure::Warning,
        (Some(_), _) => MemoryPressure::Nominal,
        (None, _) => MemoryPressure::Unknown,
    }
}

/// Builds a snapshot from raw file contents.
pub fn build_snapshot(
    vmstat: &str,
    meminfo: &str,
    psi: Option<&str>,
    page_size: u64,
) -> SampleResult<MemorySnapshot> {
    let pages = parse_vmstat(vmstat);
    let page = |names: &[&str]| -> u64 {
        names
            .iter()
            .map(|n| pages.get(*n).copied().unwrap_or(0))
            .sum::<u64>()
            * page_size
    };

    if !pages.contains_key("nr_free_pages") {
        return Err(SampleError::parse("/proc/vmstat", "missing nr_free_pages"));
    }
    let total_bytes = meminfo_bytes(meminfo, "MemTotal")
        .ok_or_else(|| SampleError::parse("/proc/meminfo", "missing MemTotal"))?;

    let free_bytes = page(&["nr_free_pages"]);
    let active_bytes = page(&["nr_active_anon", "nr_active_file"]);
    let inactive_bytes = page(&["nr_inactive_anon", "nr_inactive_file"]);
    let wired_bytes = page(&[
        "nr_unevictable",
        "nr_slab_unreclaimable",
        "nr_kernel_stack",
        "nr_page_table_pages",
    ]);
    let compressed_bytes = page(&["nr_zspages"]);
    let cached_bytes = page(&["nr_file_pages"]);

    let swap_total_bytes = meminfo_bytes(meminfo, "SwapTotal").unwrap_or(0);
    let swap_free_bytes = meminfo_bytes(meminfo, "SwapFree").unwrap_or(0);

    let used_bytes = (active_bytes + wired_bytes + compressed_bytes).min(total_bytes);

    Ok(MemorySnapshot {
        captured_at: Utc::now(),
        total_bytes,
        free_bytes,
        active_bytes,
        inactive_bytes,
        wired_bytes,
        compressed_bytes,
        cached_bytes,
        used_bytes,
        swap_total_bytes,
        swap_used_bytes: swap_total_bytes.saturating_sub(swap_free_bytes),
        pressure: classify_pressure(psi),
    })
}

/// Stateless virtual-memory sampler.
pub struct MemorySampler {
    proc_root: PathBuf,
}

impl MemorySampler {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }
}

impl Sampler for MemorySampler {
    type Output = MemorySnapshot;

    fn sample(&mut self) -> SampleResult<MemorySnapshot> {
        let vmstat = system::read_file(&self.proc_root.join("vmstat"))?;
        let meminfo = system::read_file(&self.proc_root.join("meminfo"))?;
        // PSI is optional (CONFIG_PSI); absence only downgrades the pressure field
        let psi = std::fs::read_to_string(self.proc_root.join("pressure").join("memory")).ok();

        let snapshot = build_snapshot(&vmstat, &meminfo, psi.as_deref(), *PAGE_SIZE)?;
        debug!(
            "Memory sample: {} / {} bytes used, pressure {:?}",
            snapshot.used_bytes, snapshot.total_bytes, snapshot.pressure
        );
        Ok(snapshot)
    }
}
