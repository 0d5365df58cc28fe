//! Validated process control.
//!
//! Every request re-reads the target's start time and compares it with the
//! start time the caller observed. A mismatch means the pid now belongs to a
//! different process and no signal is sent.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::ControlError;
use crate::process::scanner::ProcfsSource;
use crate::snapshot::ControlToken;

/// Default start-time tolerance in seconds.
pub const DEFAULT_START_TIME_TOLERANCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ControlAction {
    Terminate,
    ForceKill,
    Suspend,
    Resume,
}

impl ControlAction {
    pub fn signal(self) -> Signal {
        match self {
            ControlAction::Terminate => Signal::SIGTERM,
            ControlAction::ForceKill => Signal::SIGKILL,
            ControlAction::Suspend => Signal::SIGSTOP,
            ControlAction::Resume => Signal::SIGCONT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ControlAction::Terminate => "terminate",
            ControlAction::ForceKill => "force-kill",
            ControlAction::Suspend => "suspend",
            ControlAction::Resume => "resume",
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "terminate" | "term" => Ok(ControlAction::Terminate),
            "force-kill" | "force_kill" | "kill" => Ok(ControlAction::ForceKill),
            "suspend" | "stop" => Ok(ControlAction::Suspend),
            "resume" | "continue" | "cont" => Ok(ControlAction::Resume),
            other => Err(format!("unknown control action '{}'", other)),
        }
    }
}

/// Result of an accepted control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlOutcome {
    Signaled,
    /// The process exited between validation and signalling.
    AlreadyExited,
}

/// Reads the current start time of a pid.
pub trait ProcessProbe: Send + Sync {
    /// Seconds since the Unix epoch, `None` if no such process exists.
    fn start_time(&self, pid: u32) -> Option<f64>;
}

impl ProcessProbe for ProcfsSource {
    fn start_time(&self, pid: u32) -> Option<f64> {
        ProcfsSource::start_time(self, pid)
    }
}

impl<T: ProcessProbe + ?Sized> ProcessProbe for Box<T> {
    fn start_time(&self, pid: u32) -> Option<f64> {
        (**self).start_time(pid)
    }
}

/// Delivers a signal to a pid.
pub trait SignalSender: Send + Sync {
    fn send(&self, pid: i32, signal: Signal) -> Result<(), Errno>;
}

impl<T: SignalSender + ?Sized> SignalSender for Box<T> {
    fn send(&self, pid: i32, signal: Signal) -> Result<(), Errno> {
        (**self).send(pid, signal)
    }
}

/// Sends real signals through kill(2).
#[derive(Debug, Default, Clone, Copy)]
pub struct KillSender;

impl SignalSender for KillSender {
    fn send(&self, pid: i32, signal: Signal) -> Result<(), Errno> {
        kill(Pid::from_raw(pid), signal)
    }
}

pub struct ProcessController<P = ProcfsSource, K = KillSender> {
    probe: P,
    sender: K,
    tolerance: f64,
}

impl<P: ProcessProbe, K: SignalSender> ProcessController<P, K> {
    pub fn new(probe: P, sender: K) -> Self {
        Self::with_tolerance(probe, sender, DEFAULT_START_TIME_TOLERANCE)
    }

    pub fn with_tolerance(probe: P, sender: K, tolerance: f64) -> Self {
        Self {
            probe,
            sender,
            tolerance,
        }
    }

    /// Validates `token` against the live process and sends `action`.
    pub fn apply(
        &self,
        token: ControlToken,
        action: ControlAction,
    ) -> Result<ControlOutcome, ControlError> {
        let pid = token.pid;
        if pid == 0 || pid > i32::MAX as u32 {
            return Err(ControlError::InvalidTarget { pid });
        }

        let actual = self
            .probe
            .start_time(pid)
            .ok_or(ControlError::ProcessNotFound { pid })?;

        if let Some(expected) = token.expected_start_time {
            // NaN never matches
            if !((expected - actual).abs() <= self.tolerance) {
                warn!(
                    "Refusing to {} pid {}: start time {:.2} does not match expected {:.2}",
                    action, pid, actual, expected
                );
                return Err(ControlError::ProcessChanged {
                    pid,
                    expected,
                    actual,
                });
            }
        }

        match self.sender.send(pid as i32, action.signal()) {
            Ok(()) => {
                info!("Sent {} to pid {}", action.signal(), pid);
                Ok(ControlOutcome::Signaled)
            }
            Err(Errno::ESRCH) => {
                info!("pid {} exited before {} could be delivered", pid, action);
                Ok(ControlOutcome::AlreadyExited)
            }
            Err(Errno::EPERM) => Err(ControlError::PermissionDenied { pid }),
            Err(errno) => Err(ControlError::Os {
                pid,
                errno: errno as i32,
            }),
        }
    }

    pub fn terminate(&self, token: ControlToken) -> Result<ControlOutcome, ControlError> {
        self.apply(token, ControlAction::Terminate)
    }

    pub fn force_kill(&self, token: ControlToken) -> Result<ControlOutcome, ControlError> {
        self.apply(token, ControlAction::ForceKill)
    }

    pub fn suspend(&self, token: ControlToken) -> Result<ControlOutcome, ControlError> {
        self.apply(token, ControlAction::Suspend)
    }

    pub fn resume(&self, token: ControlToken) -> Result<ControlOutcome, ControlError> {
        self.apply(token, ControlAction::Resume)
    }
}

impl ProcessController<ProcfsSource, KillSender> {
    pub fn for_procfs(proc_root: impl Into<std::path::PathBuf>) -> Self {
        Self::new(
            ProcfsSource::with_icons(proc_root, crate::process::icons::IconIndex::new(Vec::new())),
            KillSender,
        )
    }
}
