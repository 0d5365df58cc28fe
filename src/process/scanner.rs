//! Process discovery and per-process reads.
//!
//! [`ProcessSource`] is the seam between the process sampler and the OS.
//! [`ProcfsSource`] implements it on top of a procfs root so tests can point
//! it at a fake tree.

use nix::unistd::{Uid, User};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{SampleError, SampleResult};
use crate::process::icons::IconIndex;
use crate::process::stat::{parse_pid_stat, parse_statm_resident};
use crate::system::{self, CLK_TCK, PAGE_SIZE};

/// Identity and run-state fields, read every cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessStatus {
    pub comm: String,
    pub parent_pid: u32,
    /// Seconds since the Unix epoch.
    pub start_time: f64,
    pub run_state: char,
    pub uid: u32,
}

/// Resource usage fields, read on full refreshes and for active processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessUsage {
    /// user + system clock ticks.
    pub cpu_ticks: u64,
    pub resident_bytes: u64,
    pub threads: u32,
}

/// OS primitives the process sampler and controller depend on.
///
/// A read for a process that no longer exists must fail with an error for
/// which [`SampleError::is_not_found`] is true.
pub trait ProcessSource: Send + Sync + 'static {
    fn list_pids(&self) -> SampleResult<Vec<u32>>;
    fn status(&self, pid: u32) -> SampleResult<ProcessStatus>;
    fn usage(&self, pid: u32) -> SampleResult<ProcessUsage>;
    fn name(&self, pid: u32) -> Option<String>;
    fn user_name(&self, uid: u32) -> Option<String>;
    fn icon(&self, process_name: &str) -> Option<String>;
    fn ticks_per_second(&self) -> f64;
    fn core_count(&self) -> usize;
}

/// Scans a procfs root for numeric pid directories.
pub fn collect_pids(root: &Path) -> SampleResult<Vec<u32>> {
    let entries = fs::read_dir(root).map_err(|e| SampleError::io(root, e))?;
    let mut pids: Vec<u32> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            if !name.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            name.parse().ok()
        })
        .collect();
    pids.sort_unstable();
    Ok(pids)
}

/// Reads process name from comm file or extracts from cmdline.
pub fn read_process_name(proc_path: &Path) -> Option<String> {
    if let Ok(s) = fs::read_to_string(proc_path.join("comm")) {
        let t = s.trim();
        if !t.is_empty() {
            return Some(t.into());
        }
    }

    let content = fs::read(proc_path.join("cmdline")).ok()?;
    let first = content.split(|&b| b == 0u8).next()?;
    let first = std::str::from_utf8(first).ok()?;
    Path::new(first)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
}

/// [`ProcessSource`] backed by procfs.
pub struct ProcfsSource {
    root: PathBuf,
    boot_time: u64,
    ticks_per_second: f64,
    page_size: u64,
    cores: usize,
    icons: IconIndex,
}

impl ProcfsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_icons(root, IconIndex::default())
    }

    pub fn with_icons(root: impl Into<PathBuf>, icons: IconIndex) -> Self {
        let root = root.into();
        let boot_time = system::read_boot_time(&root).unwrap_or_else(|e| {
            warn!("Could not read boot time, start times will be relative: {}", e);
            0
        });
        Self {
            root,
            boot_time,
            ticks_per_second: *CLK_TCK,
            page_size: *PAGE_SIZE,
            cores: system::online_cores(),
            icons,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pid_dir(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    fn read_stat(&self, pid: u32) -> SampleResult<crate::process::stat::PidStat> {
        let content = system::read_file(&self.pid_dir(pid).join("stat"))?;
        parse_pid_stat(&content)
    }

    /// Current start time of `pid`, `None` if it does not exist.
    pub fn start_time(&self, pid: u32) -> Option<f64> {
        self.read_stat(pid)
            .ok()
            .map(|s| s.start_time_epoch(self.boot_time, self.ticks_per_second))
    }
}

impl ProcessSource for ProcfsSource {
    fn list_pids(&self) -> SampleResult<Vec<u32>> {
        collect_pids(&self.root)
    }

    fn status(&self, pid: u32) -> SampleResult<ProcessStatus> {
        let dir = self.pid_dir(pid);
        let uid = fs::metadata(&dir)
            .map_err(|e| SampleError::io(&dir, e))?
            .uid();
        let stat = self.read_stat(pid)?;
        Ok(ProcessStatus {
            start_time: stat.start_time_epoch(self.boot_time, self.ticks_per_second),
            comm: stat.comm,
            parent_pid: stat.ppid,
            run_state: stat.state,
            uid,
        })
    }

    fn usage(&self, pid: u32) -> SampleResult<ProcessUsage> {
        let stat = self.read_stat(pid)?;
        let statm = system::read_file(&self.pid_dir(pid).join("statm"))?;
        Ok(ProcessUsage {
            cpu_ticks: stat.cpu_ticks(),
            resident_bytes: parse_statm_resident(&statm)? * self.page_size,
            threads: stat.num_threads,
        })
    }

    fn name(&self, pid: u32) -> Option<String> {
        read_process_name(&self.pid_dir(pid))
    }

    fn user_name(&self, uid: u32) -> Option<String> {
        User::from_uid(Uid::from_raw(uid))
            .ok()
            .flatten()
            .map(|u| u.name)
    }

    fn icon(&self, process_name: &str) -> Option<String> {
        self.icons.lookup(process_name)
    }

    fn ticks_per_second(&self) -> f64 {
        self.ticks_per_second
    }

    fn core_count(&self) -> usize {
        self.cores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::stat::format_stat_line;
    use tempfile::tempdir;

    fn fake_proc(root: &Path) {
        std::fs::write(root.join("stat"), "cpu 1 2 3 4\nbtime 1700000000\n").unwrap();
        for pid in [1u32, 42] {
            let dir = root.join(pid.to_string());
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(
                dir.join("stat"),
                format_stat_line(pid, "worker", 'S', 1, (30, 20), 3, 500),
            )
            .unwrap();
            std::fs::write(dir.join("statm"), "100 25 5 1 0 10 0\n").unwrap();
            std::fs::write(dir.join("comm"), "worker\n").unwrap();
        }
        std::fs::create_dir_all(root.join("self")).unwrap();
        std::fs::create_dir_all(root.join("net")).unwrap();
    }

    fn source(root: &Path) -> ProcfsSource {
        ProcfsSource::with_icons(root, IconIndex::new(Vec::new()))
    }

    // -------------------------------------------------------------------------
    // Tests for procfs reads
    // -------------------------------------------------------------------------

    #[test]
    fn test_collect_pids_numeric_only() {
        let dir = tempdir().expect("Failed to create temp dir");
        fake_proc(dir.path());
        assert_eq!(collect_pids(dir.path()).unwrap(), vec![1, 42]);
    }

    #[test]
    fn test_status_and_usage() {
        let dir = tempdir().expect("Failed to create temp dir");
        fake_proc(dir.path());
        let src = source(dir.path());

        let status = src.status(42).unwrap();
        assert_eq!(status.comm, "worker");
        assert_eq!(status.parent_pid, 1);
        assert_eq!(status.run_state, 'S');
        let expected = 1_700_000_000.0 + 500.0 / src.ticks_per_second();
        assert!((status.start_time - expected).abs() < 1e-6);
        assert_eq!(src.start_time(42), Some(status.start_time));

        let usage = src.usage(42).unwrap();
        assert_eq!(usage.cpu_ticks, 50);
        assert_eq!(usage.threads, 3);
        assert_eq!(usage.resident_bytes, 25 * *PAGE_SIZE);
    }

    #[test]
    fn test_vanished_process_is_not_found() {
        let dir = tempdir().expect("Failed to create temp dir");
        fake_proc(dir.path());
        let src = source(dir.path());

        assert!(src.status(999).unwrap_err().is_not_found());
        assert!(src.usage(999).unwrap_err().is_not_found());
        assert_eq!(src.start_time(999), None);
    }

    #[test]
    fn test_read_process_name_falls_back_to_cmdline() {
        let dir = tempdir().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("comm"), "\n").unwrap();
        std::fs::write(dir.path().join("cmdline"), b"/usr/bin/python3\0script.py\0").unwrap();
        assert_eq!(read_process_name(dir.path()), Some("python3".to_string()));
    }
}
