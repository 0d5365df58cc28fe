//! The monitor: owns every sampler, drives the cycle schedule, publishes
//! results and exposes process control.
//!
//! Each cycle's samplers run concurrently as blocking tasks. A sampler is
//! held in its own mutex and acquired with `try_lock`, so a sampler still
//! running from an earlier cycle is skipped instead of waited for. Each
//! result is published as soon as its own sampler finishes. The start-up
//! baseline pass only seeds the samplers' delta state.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock as StdRwLock, TryLockError};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::collectors::disk::DEFAULT_EXCLUDED_MOUNT_PREFIXES;
use crate::collectors::{CpuSampler, DiskSampler, GpuSampler, MemorySampler, NetworkSampler, Sampler};
use crate::error::{ControlError, SampleError};
use crate::history::{HistoryPoint, DEFAULT_HISTORY_CAPACITY};
use crate::history_store::{HistoryStats, HistoryStore, MetricStream};
use crate::process::{
    ControlAction, ControlOutcome, KillSender, ProcessController, ProcessProbe, ProcessSampler,
    ProcessSamplerConfig, ProcfsSource, SignalSender, DEFAULT_START_TIME_TOLERANCE,
};
use crate::process::icons::IconIndex;
use crate::sampler_stats::{SamplerStats, SamplerStatsSnapshot};
use crate::scheduler::{CyclePlan, SamplerKind, SchedulerConfig, TieredScheduler};
use crate::snapshot::{
    ControlToken, CpuSnapshot, CpuTopology, DiskSnapshot, GpuSnapshot, MemorySnapshot,
    NetworkSnapshot, ProcessList,
};
use crate::system::{DEFAULT_PROC_ROOT, DEFAULT_SYS_ROOT};

/// Default cycle period.
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// A sampler behind dynamic dispatch.
pub type BoxedSampler<T> = Box<dyn Sampler<Output = T>>;

type Shared<T> = Arc<Mutex<BoxedSampler<T>>>;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval_ms: u64,
    pub history_capacity: usize,
    pub scheduler: SchedulerConfig,
    pub processes: ProcessSamplerConfig,
    pub proc_root: PathBuf,
    pub sys_root: PathBuf,
    pub excluded_mount_prefixes: Vec<String>,
    pub start_time_tolerance: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            scheduler: SchedulerConfig::default(),
            processes: ProcessSamplerConfig::default(),
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            sys_root: PathBuf::from(DEFAULT_SYS_ROOT),
            excluded_mount_prefixes: DEFAULT_EXCLUDED_MOUNT_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            start_time_tolerance: DEFAULT_START_TIME_TOLERANCE,
        }
    }
}

/// One sampler of each kind plus the detected CPU topology.
pub struct SamplerSet {
    pub cpu: BoxedSampler<CpuSnapshot>,
    pub memory: BoxedSampler<MemorySnapshot>,
    pub network: BoxedSampler<NetworkSnapshot>,
    pub gpu: BoxedSampler<GpuSnapshot>,
    pub disk: BoxedSampler<DiskSnapshot>,
    pub processes: BoxedSampler<ProcessList>,
    pub topology: CpuTopology,
}

impl SamplerSet {
    /// Samplers reading the procfs and sysfs roots named in `config`.
    pub fn linux(config: &MonitorConfig) -> Self {
        let cpu = CpuSampler::new(&config.proc_root, &config.sys_root);
        let topology = cpu.topology().clone();
        Self {
            cpu: Box::new(cpu),
            memory: Box::new(MemorySampler::new(&config.proc_root)),
            network: Box::new(NetworkSampler::new(&config.proc_root, &config.sys_root)),
            gpu: Box::new(GpuSampler::new(&config.proc_root, &config.sys_root)),
            disk: Box::new(DiskSampler::new(
                &config.proc_root,
                &config.sys_root,
                config.excluded_mount_prefixes.clone(),
            )),
            processes: Box::new(ProcessSampler::new(
                ProcfsSource::new(&config.proc_root),
                config.processes.clone(),
            )),
            topology,
        }
    }
}

/// Lifecycle of the periodic driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    Running,
}

/// The most recent published value of every metric.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LatestSnapshots {
    pub cycle: u64,
    pub cpu: Option<CpuSnapshot>,
    pub memory: Option<MemorySnapshot>,
    pub network: Option<NetworkSnapshot>,
    pub gpu: Option<GpuSnapshot>,
    pub disk: Option<DiskSnapshot>,
    pub processes: Option<ProcessList>,
}

struct Driver {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

type Controller = ProcessController<Box<dyn ProcessProbe>, Box<dyn SignalSender>>;

struct MonitorInner {
    config: MonitorConfig,
    topology: CpuTopology,
    cpu: Shared<CpuSnapshot>,
    memory: Shared<MemorySnapshot>,
    network: Shared<NetworkSnapshot>,
    gpu: Shared<GpuSnapshot>,
    disk: Shared<DiskSnapshot>,
    processes: Shared<ProcessList>,
    scheduler: Mutex<TieredScheduler>,
    latest: StdRwLock<LatestSnapshots>,
    history: HistoryStore,
    stats: SamplerStats,
    controller: Controller,
    running: AtomicBool,
    driver: AsyncMutex<Option<Driver>>,
}

/// Handle to a monitor. Cloning shares the same instance.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

fn shared<T: Clone + Send + Sync + 'static>(sampler: BoxedSampler<T>) -> Shared<T> {
    Arc::new(Mutex::new(sampler))
}

impl Monitor {
    /// A monitor over the live system.
    pub fn new(config: MonitorConfig) -> Self {
        let samplers = SamplerSet::linux(&config);
        let probe = ProcfsSource::with_icons(&config.proc_root, IconIndex::new(Vec::new()));
        Self::with_samplers(config, samplers, Box::new(probe), Box::new(KillSender))
    }

    /// A monitor over the given samplers and control primitives.
    pub fn with_samplers(
        config: MonitorConfig,
        samplers: SamplerSet,
        probe: Box<dyn ProcessProbe>,
        sender: Box<dyn SignalSender>,
    ) -> Self {
        let controller =
            ProcessController::with_tolerance(probe, sender, config.start_time_tolerance);
        let inner = MonitorInner {
            history: HistoryStore::new(config.history_capacity, config.interval_ms),
            scheduler: Mutex::new(TieredScheduler::new(config.scheduler.clone())),
            topology: samplers.topology,
            cpu: shared(samplers.cpu),
            memory: shared(samplers.memory),
            network: shared(samplers.network),
            gpu: shared(samplers.gpu),
            disk: shared(samplers.disk),
            processes: shared(samplers.processes),
            latest: StdRwLock::new(LatestSnapshots::default()),
            stats: SamplerStats::new(),
            controller,
            running: AtomicBool::new(false),
            driver: AsyncMutex::new(None),
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Runs the baseline pass, then starts the periodic driver.
    ///
    /// Returns `false` if the monitor was already running.
    #[instrument(skip(self))]
    pub async fn start(&self) -> bool {
        let mut driver = self.inner.driver.lock().await;
        if driver.is_some() {
            return false;
        }

        info!(
            "Starting monitor (interval {} ms, history {} points)",
            self.inner.config.interval_ms, self.inner.config.history_capacity
        );
        self.run_baseline().await;

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(drive(self.inner.clone(), rx));
        *driver = Some(Driver { shutdown: tx, task });
        self.inner.running.store(true, Ordering::SeqCst);
        true
    }

    /// Cancels future cycles. Batches already started still complete and
    /// publish.
    ///
    /// Returns `false` if the monitor was not running.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> bool {
        let mut driver = self.inner.driver.lock().await;
        let Some(d) = driver.take() else {
            return false;
        };
        self.inner.running.store(false, Ordering::SeqCst);
        let _ = d.shutdown.send(true);
        if let Err(e) = d.task.await {
            warn!("Monitor driver ended abnormally: {}", e);
        }
        info!("Monitor stopped after {} cycles", self.cycle());
        true
    }

    pub fn state(&self) -> MonitorState {
        if self.inner.running.load(Ordering::SeqCst) {
            MonitorState::Running
        } else {
            MonitorState::Idle
        }
    }

    /// Samples every metric once to seed delta baselines. Nothing is
    /// published and no history is recorded.
    pub async fn run_baseline(&self) {
        let plan = self.inner.lock_scheduler().baseline_plan();
        self.inner.clone().run_plan(plan).await;
    }

    /// Runs the next scheduled cycle immediately and waits for its batch.
    pub async fn run_cycle(&self) -> CyclePlan {
        let plan = self.inner.lock_scheduler().next_plan();
        self.inner.clone().run_plan(plan.clone()).await;
        plan
    }

    pub fn cycle(&self) -> u64 {
        self.inner.lock_scheduler().cycle()
    }

    pub fn topology(&self) -> &CpuTopology {
        &self.inner.topology
    }

    pub fn latest(&self) -> LatestSnapshots {
        self.inner.read_latest().clone()
    }

    pub fn cpu(&self) -> Option<CpuSnapshot> {
        self.inner.read_latest().cpu.clone()
    }

    pub fn memory(&self) -> Option<MemorySnapshot> {
        self.inner.read_latest().memory.clone()
    }

    pub fn network(&self) -> Option<NetworkSnapshot> {
        self.inner.read_latest().network.clone()
    }

    pub fn gpu(&self) -> Option<GpuSnapshot> {
        self.inner.read_latest().gpu.clone()
    }

    pub fn disk(&self) -> Option<DiskSnapshot> {
        self.inner.read_latest().disk.clone()
    }

    pub fn processes(&self) -> Option<ProcessList> {
        self.inner.read_latest().processes.clone()
    }

    pub fn history(&self, stream: MetricStream) -> Vec<HistoryPoint> {
        self.inner.history.history(stream)
    }

    pub fn history_stats(&self) -> HistoryStats {
        self.inner.history.stats()
    }

    pub fn sampler_stats(&self) -> Vec<SamplerStatsSnapshot> {
        self.inner.stats.snapshot_all()
    }

    pub fn sampler_stats_table(&self) -> String {
        self.inner.stats.render_table()
    }

    pub fn samplers_healthy(&self) -> bool {
        self.inner.stats.core_samplers_healthy()
    }

    /// Validates `token` and sends the signal for `action`.
    pub fn control(
        &self,
        token: ControlToken,
        action: ControlAction,
    ) -> Result<ControlOutcome, ControlError> {
        self.inner.controller.apply(token, action)
    }

    pub fn terminate(&self, token: ControlToken) -> Result<ControlOutcome, ControlError> {
        self.inner.controller.terminate(token)
    }

    pub fn force_kill(&self, token: ControlToken) -> Result<ControlOutcome, ControlError> {
        self.inner.controller.force_kill(token)
    }

    pub fn suspend(&self, token: ControlToken) -> Result<ControlOutcome, ControlError> {
        self.inner.controller.suspend(token)
    }

    pub fn resume(&self, token: ControlToken) -> Result<ControlOutcome, ControlError> {
        self.inner.controller.resume(token)
    }
}

/// Periodic driver. Each tick's batch runs as its own task so a hung
/// sampler never delays the next tick.
async fn drive(inner: Arc<MonitorInner>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(Duration::from_millis(inner.config.interval_ms.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // the first tick completes immediately and the baseline already ran
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                let plan = inner.lock_scheduler().next_plan();
                debug!("Cycle {}: {:?}", plan.cycle, plan.samplers);
                tokio::spawn(inner.clone().run_plan(plan));
            }
        }
    }
    debug!("Monitor driver exiting");
}

impl MonitorInner {
    fn lock_scheduler(&self) -> std::sync::MutexGuard<'_, TieredScheduler> {
        self.scheduler.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_latest(&self) -> std::sync::RwLockReadGuard<'_, LatestSnapshots> {
        self.latest.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_latest(&self) -> std::sync::RwLockWriteGuard<'_, LatestSnapshots> {
        self.latest.write().unwrap_or_else(|e| e.into_inner())
    }

    async fn run_plan(self: Arc<Self>, plan: CyclePlan) {
        let mut set = JoinSet::new();
        for kind in &plan.samplers {
            let baseline = plan.baseline;
            match kind {
                SamplerKind::Cpu => {
                    spawn_sampler(&mut set, &self, *kind, &self.cpu, baseline, MonitorInner::publish_cpu)
                }
                SamplerKind::Memory => spawn_sampler(
                    &mut set,
                    &self,
                    *kind,
                    &self.memory,
                    baseline,
                    MonitorInner::publish_memory,
                ),
                SamplerKind::Network => spawn_sampler(
                    &mut set,
                    &self,
                    *kind,
                    &self.network,
                    baseline,
                    MonitorInner::publish_network,
                ),
                SamplerKind::Processes => spawn_sampler(
                    &mut set,
                    &self,
                    *kind,
                    &self.processes,
                    baseline,
                    MonitorInner::publish_processes,
                ),
                SamplerKind::Disk => spawn_sampler(
                    &mut set,
                    &self,
                    *kind,
                    &self.disk,
                    baseline,
                    MonitorInner::publish_disk,
                ),
                SamplerKind::Gpu => {
                    spawn_sampler(&mut set, &self, *kind, &self.gpu, baseline, MonitorInner::publish_gpu)
                }
            }
        }

        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                warn!("Sampler task failed to join: {}", e);
            }
        }

        // a batch held up by a slow sampler may finish after a later one
        if !plan.baseline {
            let mut latest = self.write_latest();
            latest.cycle = latest.cycle.max(plan.cycle);
        }
    }

    fn publish_cpu(&self, snapshot: CpuSnapshot) {
        self.history.record(
            MetricStream::Cpu,
            HistoryPoint::new(snapshot.captured_at, snapshot.usage_percent),
        );
        self.write_latest().cpu = Some(snapshot);
    }

    fn publish_memory(&self, snapshot: MemorySnapshot) {
        self.history.record(
            MetricStream::Memory,
            HistoryPoint::with_secondary(
                snapshot.captured_at,
                snapshot.used_percent(),
                snapshot.swap_used_percent(),
            ),
        );
        self.write_latest().memory = Some(snapshot);
    }

    fn publish_network(&self, snapshot: NetworkSnapshot) {
        self.history.record(
            MetricStream::Network,
            HistoryPoint::with_secondary(
                snapshot.captured_at,
                snapshot.rx_bytes_per_sec,
                snapshot.tx_bytes_per_sec,
            ),
        );
        self.write_latest().network = Some(snapshot);
    }

    fn publish_gpu(&self, snapshot: GpuSnapshot) {
        self.history.record(
            MetricStream::Gpu,
            HistoryPoint::with_secondary(
                snapshot.captured_at,
                snapshot.utilization_percent.unwrap_or(0.0),
                snapshot.memory_percent,
            ),
        );
        self.write_latest().gpu = Some(snapshot);
    }

    fn publish_disk(&self, snapshot: DiskSnapshot) {
        self.history.record(
            MetricStream::Disk,
            HistoryPoint::new(snapshot.captured_at, snapshot.used_percent()),
        );
        self.write_latest().disk = Some(snapshot);
    }

    fn publish_processes(&self, list: ProcessList) {
        self.history.record(
            MetricStream::Processes,
            HistoryPoint::with_secondary(
                list.captured_at,
                list.total_normalized_cpu(),
                list.processes.len() as f64,
            ),
        );
        self.write_latest().processes = Some(list);
    }
}

/// Runs one sampler on the blocking pool. The result is published before
/// the sampler's lock is released, so one sampler's results are published in
/// the order they were taken. Baseline results only seed the sampler.
fn spawn_sampler<T>(
    set: &mut JoinSet<()>,
    inner: &Arc<MonitorInner>,
    kind: SamplerKind,
    sampler: &Shared<T>,
    baseline: bool,
    publish: fn(&MonitorInner, T),
) where
    T: Clone + Send + Sync + 'static,
{
    let inner = inner.clone();
    let sampler = sampler.clone();
    set.spawn(async move {
        let started = Instant::now();
        let task_inner = inner.clone();
        let result = tokio::task::spawn_blocking(move || {
            let inner = task_inner;
            let mut guard = match sampler.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    debug!("{} sampler still busy, skipping this cycle", kind);
                    inner.stats.record_skipped_busy(kind);
                    return;
                }
            };
            let sampled = guard.sample();
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            match sampled {
                Ok(value) => {
                    if baseline {
                        debug!("{} baseline taken", kind);
                    } else {
                        publish(&inner, value);
                    }
                    inner.stats.record_success(kind, elapsed_ms);
                }
                Err(SampleError::Unavailable(what)) => {
                    debug!("{} sampler skipped: {} not available", kind, what);
                    inner
                        .stats
                        .record_failure(kind, elapsed_ms, &format!("{} not available", what));
                }
                Err(e) => {
                    warn!("{} sampler failed: {}", kind, e);
                    inner.stats.record_failure(kind, elapsed_ms, &e.to_string());
                }
            }
        })
        .await;

        if let Err(e) = result {
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            warn!("{} sampler panicked: {}", kind, e);
            inner.stats.record_failure(kind, elapsed_ms, "sampler panicked");
        }
    });
}
