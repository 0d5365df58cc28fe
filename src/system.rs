//! Shared helpers for reading the /proc and /sys file systems.
//!
//! All readers take the file system root as a parameter so that tests can
//! point them at a temporary directory tree instead of the live system.

use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;

use crate::error::{SampleError, SampleResult};

/// Default mount point of procfs.
pub const DEFAULT_PROC_ROOT: &str = "/proc";
/// Default mount point of sysfs.
pub const DEFAULT_SYS_ROOT: &str = "/sys";

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    // SAFETY: sysconf is safe to call with _SC_CLK_TCK
    // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
    let tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if tck > 0 {
        tck as f64
    } else {
        100.0
    }
}

fn get_page_size() -> u64 {
    // SAFETY: sysconf is safe to call with _SC_PAGESIZE
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

/// System clock ticks per second (for CPU time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Size of a memory page in bytes.
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(get_page_size);

/// Number of logical cores online, at least 1.
pub fn online_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Reads a whole file into a string, mapping failures to `SampleError::Io`.
pub fn read_file(path: &Path) -> SampleResult<String> {
    fs::read_to_string(path).map_err(|e| SampleError::io(path, e))
}

/// Reads a single trimmed line (sysfs attribute style). `None` if missing.
pub fn read_attr(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Reads a sysfs attribute holding an unsigned integer.
pub fn read_attr_u64(path: &Path) -> Option<u64> {
    read_attr(path)?.parse().ok()
}

/// Extracts a `Key:   1234 kB` style value from /proc/meminfo content, in bytes.
pub fn meminfo_bytes(content: &str, key: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let rest = line.strip_prefix(key)?.strip_prefix(':')?;
        let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
        Some(kb * 1024)
    })
}

/// Reads system uptime from /proc/uptime.
///
/// Returns uptime in seconds.
/// Format: "<uptime_seconds> <idle_seconds>"
pub fn read_uptime(proc_root: &Path) -> SampleResult<f64> {
    let path = proc_root.join("uptime");
    let content = read_file(&path)?;

    content
        .split_whitespace()
        .next()
        .ok_or_else(|| SampleError::parse("/proc/uptime", "no fields found"))?
        .parse::<f64>()
        .map_err(|e| SampleError::parse("/proc/uptime", e.to_string()))
}

/// Reads the boot time (seconds since the Unix epoch) from the `btime` line
/// of /proc/stat.
pub fn read_boot_time(proc_root: &Path) -> SampleResult<u64> {
    let path = proc_root.join("stat");
    let content = read_file(&path)?;

    content
        .lines()
        .find_map(|line| line.strip_prefix("btime "))
        .ok_or_else(|| SampleError::parse("/proc/stat", "missing btime"))?
        .trim()
        .parse::<u64>()
        .map_err(|e| SampleError::parse("/proc/stat", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_meminfo_bytes() {
        let content = "MemTotal:       16384000 kB\nMemFree:         1024 kB\nSwapTotal:  0 kB\n";
        assert_eq!(meminfo_bytes(content, "MemTotal"), Some(16_384_000 * 1024));
        assert_eq!(meminfo_bytes(content, "MemFree"), Some(1024 * 1024));
        assert_eq!(meminfo_bytes(content, "SwapTotal"), Some(0));
        assert_eq!(meminfo_bytes(content, "Cached"), None);
    }

    #[test]
    fn test_read_boot_time() {
        let dir = tempdir().expect("Failed to create temp dir");
        std::fs::write(
            dir.path().join("stat"),
            "cpu  1 2 3 4 5 6 7 8\nctxt 100\nbtime 1700000000\nprocesses 42\n",
        )
        .expect("Failed to write stat file");

        assert_eq!(read_boot_time(dir.path()).unwrap(), 1_700_000_000);
    }

    #[test]
    fn test_read_uptime() {
        let dir = tempdir().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("uptime"), "12345.67 54321.00\n")
            .expect("Failed to write uptime file");

        let uptime = read_uptime(dir.path()).unwrap();
        assert!((uptime - 12345.67).abs() < 1e-6);
    }

    #[test]
    fn test_read_uptime_missing_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        assert!(read_uptime(dir.path()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_clock_constants_positive() {
        assert!(*CLK_TCK > 0.0);
        assert!(*PAGE_SIZE >= 1024);
        assert!(online_cores() >= 1);
    }
}
