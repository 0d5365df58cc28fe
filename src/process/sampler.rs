//! Per-process sampling with tiered refresh.
//!
//! Identity and run state are read for every process on every call. CPU
//! ticks, thread count and resident memory are read on full refreshes, for
//! processes never measured, and for processes that were active on their
//! last measurement. On lightweight refreshes idle processes keep their last
//! measured values, which are therefore at most `full_refresh_every - 1`
//! invocations old.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, trace};

use crate::collectors::Sampler;
use crate::error::SampleResult;
use crate::process::scanner::{ProcessSource, ProcessStatus, ProcessUsage, ProcfsSource};
use crate::rate::{clamp_percent, RateCounter};
use crate::snapshot::{ProcessList, ProcessSnapshot, ProcessState, RefreshTier};

/// Start times closer than this are the same process generation.
const GENERATION_EPSILON_SECS: f64 = 0.01;

/// Tiering and state-mapping thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessSamplerConfig {
    /// The first N invocations are all full refreshes.
    pub full_refresh_warmup: u64,
    /// After warm-up, every Nth invocation is a full refresh.
    pub full_refresh_every: u64,
    /// Last CPU percent above which a process is re-measured every call.
    pub active_cpu_threshold: f64,
    /// A runnable process is shown as Running only above this CPU percent.
    pub running_cpu_threshold: f64,
}

impl Default for ProcessSamplerConfig {
    fn default() -> Self {
        Self {
            full_refresh_warmup: 3,
            full_refresh_every: 3,
            active_cpu_threshold: 0.5,
            running_cpu_threshold: 0.1,
        }
    }
}

impl ProcessSamplerConfig {
    pub fn tier_for(&self, invocation: u64) -> RefreshTier {
        let every = self.full_refresh_every.max(1);
        if invocation <= self.full_refresh_warmup || invocation % every == 0 {
            RefreshTier::Full
        } else {
            RefreshTier::Lightweight
        }
    }
}

/// Maps a procfs run-state code to a displayed state.
pub fn map_run_state(code: char, cpu_percent: f64, running_threshold: f64) -> ProcessState {
    match code {
        'R' if cpu_percent > running_threshold => ProcessState::Running,
        'R' | 'S' | 'D' | 'I' => ProcessState::Sleeping,
        'T' | 't' => ProcessState::Stopped,
        'Z' => ProcessState::Zombie,
        _ => ProcessState::Unknown,
    }
}

#[derive(Debug, Clone, Copy)]
struct Detail {
    resident_bytes: u64,
    threads: u32,
}

/// Per-row data gathered before the expensive pass.
struct Pending {
    pid: u32,
    status: Option<ProcessStatus>,
    name: String,
    user: String,
    icon: Option<String>,
    measure: bool,
}

/// Stateful process sampler. Owns every per-pid cache.
pub struct ProcessSampler<S: ProcessSource = ProcfsSource> {
    source: S,
    config: ProcessSamplerConfig,
    invocation: u64,
    ticks: RateCounter<u32>,
    last_cpu: HashMap<u32, f64>,
    last_detail: HashMap<u32, Detail>,
    names: HashMap<u32, String>,
    generations: HashMap<u32, f64>,
    icons: HashMap<u32, String>,
    no_icon: HashSet<u32>,
    users: HashMap<u32, String>,
}

impl<S: ProcessSource> ProcessSampler<S> {
    pub fn new(source: S, config: ProcessSamplerConfig) -> Self {
        Self {
            source,
            config,
            invocation: 0,
            ticks: RateCounter::new(),
            last_cpu: HashMap::new(),
            last_detail: HashMap::new(),
            names: HashMap::new(),
            generations: HashMap::new(),
            icons: HashMap::new(),
            no_icon: HashSet::new(),
            users: HashMap::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &ProcessSamplerConfig {
        &self.config
    }

    /// Number of completed `sample` calls.
    pub fn invocations(&self) -> u64 {
        self.invocation
    }

    /// True if any per-pid cache still holds an entry for `pid`.
    pub fn has_cached_state(&self, pid: u32) -> bool {
        self.ticks.contains(&pid)
            || self.last_cpu.contains_key(&pid)
            || self.last_detail.contains_key(&pid)
            || self.names.contains_key(&pid)
            || self.generations.contains_key(&pid)
            || self.icons.contains_key(&pid)
            || self.no_icon.contains(&pid)
    }

    /// Number of cached user names.
    pub fn cached_users(&self) -> usize {
        self.users.len()
    }

    fn evict_pid(&mut self, pid: u32) {
        self.ticks.remove(&pid);
        self.last_cpu.remove(&pid);
        self.last_detail.remove(&pid);
        self.names.remove(&pid);
        self.generations.remove(&pid);
        self.icons.remove(&pid);
        self.no_icon.remove(&pid);
    }

    fn evict_absent(&mut self, live: &HashSet<u32>, live_uids: &HashSet<u32>) {
        let purged = self.ticks.retain_keys(live);
        self.last_cpu.retain(|pid, _| live.contains(pid));
        self.last_detail.retain(|pid, _| live.contains(pid));
        self.names.retain(|pid, _| live.contains(pid));
        self.generations.retain(|pid, _| live.contains(pid));
        self.icons.retain(|pid, _| live.contains(pid));
        self.no_icon.retain(|pid| live.contains(pid));
        self.users.retain(|uid, _| live_uids.contains(uid));
        if purged > 0 {
            trace!("Evicted tick history for {} exited processes", purged);
        }
    }

    fn cached_icon(&mut self, pid: u32, name: &str) -> Option<String> {
        if let Some(icon) = self.icons.get(&pid) {
            return Some(icon.clone());
        }
        if self.no_icon.contains(&pid) {
            return None;
        }
        match self.source.icon(name) {
            Some(icon) => {
                self.icons.insert(pid, icon.clone());
                Some(icon)
            }
            None => {
                self.no_icon.insert(pid);
                None
            }
        }
    }

    /// Cheap pass: identity, generation check and cached lookups.
    fn prepare(&mut self, pid: u32, full: bool) -> Option<Pending> {
        let status = match self.source.status(pid) {
            Ok(s) => Some(s),
            Err(e) if e.is_not_found() => return None,
            Err(e) => {
                trace!("Falling back to a reduced row for pid {}: {}", pid, e);
                None
            }
        };

        if let Some(st) = &status {
            let reused = self
                .generations
                .get(&pid)
                .is_some_and(|prev| (prev - st.start_time).abs() > GENERATION_EPSILON_SECS);
            if reused {
                debug!("pid {} was reused, resetting its cached state", pid);
                self.evict_pid(pid);
            }
            self.generations.insert(pid, st.start_time);
        }

        let name = match self.names.get(&pid) {
            Some(n) => n.clone(),
            None => {
                let name = self
                    .source
                    .name(pid)
                    .or_else(|| status.as_ref().map(|s| s.comm.clone()))
                    .filter(|n| !n.is_empty());
                match name {
                    Some(n) => {
                        self.names.insert(pid, n.clone());
                        n
                    }
                    None => pid.to_string(),
                }
            }
        };

        let user = match &status {
            Some(st) => {
                let source = &self.source;
                self.users
                    .entry(st.uid)
                    .or_insert_with(|| source.user_name(st.uid).unwrap_or_else(|| st.uid.to_string()))
                    .clone()
            }
            None => String::new(),
        };

        let icon = self.cached_icon(pid, &name);

        let measure = status.is_some()
            && (full
                || !self.last_detail.contains_key(&pid)
                || self
                    .last_cpu
                    .get(&pid)
                    .is_some_and(|cpu| *cpu > self.config.active_cpu_threshold));

        Some(Pending {
            pid,
            status,
            name,
            user,
            icon,
            measure,
        })
    }

    /// Samples every process, using `now` as the tick-rate timestamp.
    pub fn sample_at(&mut self, now: Instant) -> SampleResult<ProcessList> {
        let pids = self.source.list_pids()?;
        self.invocation += 1;
        let tier = self.config.tier_for(self.invocation);
        let full = tier == RefreshTier::Full;

        let pending: Vec<Pending> = pids
            .iter()
            .filter_map(|&pid| self.prepare(pid, full))
            .collect();

        let to_measure: Vec<u32> = pending.iter().filter(|p| p.measure).map(|p| p.pid).collect();
        let source = &self.source;
        let measured: HashMap<u32, SampleResult<ProcessUsage>> = to_measure
            .par_iter()
            .map(|&pid| (pid, source.usage(pid)))
            .collect::<Vec<_>>()
            .into_iter()
            .collect();

        let ticks_per_second = self.source.ticks_per_second();
        let cores = self.source.core_count().max(1) as f64;

        let mut processes = Vec::with_capacity(pending.len());
        let mut live = HashSet::with_capacity(pending.len());
        let mut live_uids = HashSet::new();

        for p in pending {
            let Some(status) = p.status else {
                live.insert(p.pid);
                processes.push(ProcessSnapshot {
                    pid: p.pid,
                    name: p.name,
                    user: p.user,
                    cpu_percent: 0.0,
                    normalized_cpu_percent: 0.0,
                    memory_bytes: 0,
                    threads: 0,
                    state: ProcessState::Unknown,
                    parent_pid: 0,
                    start_time: 0.0,
                    icon: p.icon,
                    limited: true,
                });
                continue;
            };

            let mut limited = false;
            let (cpu_percent, detail) = match measured.get(&p.pid) {
                Some(Ok(usage)) => {
                    let rate = self.ticks.update(p.pid, usage.cpu_ticks, now);
                    let cpu = clamp_percent(rate / ticks_per_second * 100.0, 100.0 * cores);
                    let detail = Detail {
                        resident_bytes: usage.resident_bytes,
                        threads: usage.threads,
                    };
                    self.last_cpu.insert(p.pid, cpu);
                    self.last_detail.insert(p.pid, detail);
                    (cpu, Some(detail))
                }
                Some(Err(e)) if e.is_not_found() => continue,
                Some(Err(e)) => {
                    trace!("Usage read failed for pid {}: {}", p.pid, e);
                    self.last_cpu.remove(&p.pid);
                    self.last_detail.remove(&p.pid);
                    limited = true;
                    (0.0, None)
                }
                None => (
                    self.last_cpu.get(&p.pid).copied().unwrap_or(0.0),
                    self.last_detail.get(&p.pid).copied(),
                ),
            };

            live.insert(p.pid);
            live_uids.insert(status.uid);
            let detail = detail.unwrap_or(Detail {
                resident_bytes: 0,
                threads: 0,
            });
            processes.push(ProcessSnapshot {
                pid: p.pid,
                name: p.name,
                user: p.user,
                cpu_percent,
                normalized_cpu_percent: cpu_percent / cores,
                memory_bytes: detail.resident_bytes,
                threads: detail.threads,
                state: map_run_state(
                    status.run_state,
                    cpu_percent,
                    self.config.running_cpu_threshold,
                ),
                parent_pid: status.parent_pid,
                start_time: status.start_time,
                icon: p.icon,
                limited,
            });
        }

        self.evict_absent(&live, &live_uids);

        debug!(
            "Process sample #{} ({:?}): {} processes, {} measured",
            self.invocation,
            tier,
            processes.len(),
            to_measure.len()
        );

        Ok(ProcessList {
            captured_at: Utc::now(),
            tier,
            processes,
        })
    }
}

impl ProcessSampler<ProcfsSource> {
    pub fn from_procfs(proc_root: impl Into<std::path::PathBuf>, config: ProcessSamplerConfig) -> Self {
        Self::new(ProcfsSource::new(proc_root), config)
    }
}

impl<S: ProcessSource> Sampler for ProcessSampler<S> {
    type Output = ProcessList;

    fn sample(&mut self) -> SampleResult<ProcessList> {
        self.sample_at(Instant::now())
    }
}
