//! Parsing of `/proc/<pid>/stat` and `/proc/<pid>/statm`.
//!
//! The command name in `stat` is wrapped in parentheses and may itself
//! contain spaces or parentheses, so fields are split after the last `)`.

use crate::error::{SampleError, SampleResult};

/// Fields of `/proc/<pid>/stat` used by the process sampler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidStat {
    pub comm: String,
    pub state: char,
    pub ppid: u32,
    pub utime: u64,
    pub stime: u64,
    pub num_threads: u32,
    /// Clock ticks after boot.
    pub starttime: u64,
}

impl PidStat {
    pub fn cpu_ticks(&self) -> u64 {
        self.utime.saturating_add(self.stime)
    }

    /// Start time in seconds since the Unix epoch.
    pub fn start_time_epoch(&self, boot_time: u64, ticks_per_second: f64) -> f64 {
        boot_time as f64 + self.starttime as f64 / ticks_per_second
    }
}

fn field<T: std::str::FromStr>(fields: &[&str], index: usize, name: &str) -> SampleResult<T> {
    fields
        .get(index)
        .ok_or_else(|| SampleError::parse("/proc/<pid>/stat", format!("missing {}", name)))?
        .parse()
        .map_err(|_| SampleError::parse("/proc/<pid>/stat", format!("invalid {}", name)))
}

/// Parses the content of `/proc/<pid>/stat`.
pub fn parse_pid_stat(content: &str) -> SampleResult<PidStat> {
    let open = content
        .find('(')
        .ok_or_else(|| SampleError::parse("/proc/<pid>/stat", "missing comm"))?;
    let close = content
        .rfind(')')
        .ok_or_else(|| SampleError::parse("/proc/<pid>/stat", "missing comm"))?;
    if close < open {
        return Err(SampleError::parse("/proc/<pid>/stat", "malformed comm"));
    }

    let comm = content[open + 1..close].to_string();
    // fields[0] is field 3 (state) in proc(5) numbering
    let fields: Vec<&str> = content[close + 1..].split_whitespace().collect();

    let state = fields
        .first()
        .and_then(|s| s.chars().next())
        .ok_or_else(|| SampleError::parse("/proc/<pid>/stat", "missing state"))?;

    Ok(PidStat {
        comm,
        state,
        ppid: field(&fields, 1, "ppid")?,
        utime: field(&fields, 11, "utime")?,
        stime: field(&fields, 12, "stime")?,
        num_threads: field(&fields, 17, "num_threads")?,
        starttime: field(&fields, 19, "starttime")?,
    })
}

/// Resident set size in pages, the second field of `/proc/<pid>/statm`.
pub fn parse_statm_resident(content: &str) -> SampleResult<u64> {
    content
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| SampleError::parse("/proc/<pid>/statm", "missing resident"))?
        .parse()
        .map_err(|_| SampleError::parse("/proc/<pid>/statm", "invalid resident"))
}

/// Builds a `/proc/<pid>/stat` line. Shared by tests that lay out fake trees.
#[cfg(test)]
pub(crate) fn format_stat_line(
    pid: u32,
    comm: &str,
    state: char,
    ppid: u32,
    ticks: (u64, u64),
    threads: u32,
    starttime: u64,
) -> String {
    format!(
        "{} ({}) {} {} {} {} 0 -1 4194560 100 0 0 0 {} {} 0 0 20 0 {} 0 {} 1000000 200 18446744073709551615",
        pid, comm, state, ppid, pid, pid, ticks.0, ticks.1, threads, starttime
    )
}
