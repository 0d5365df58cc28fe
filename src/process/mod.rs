//! Process enumeration, sampling and control.
//!
//! This module provides:
//! - `stat`: parsing of /proc/<pid>/stat and statm
//! - `scanner`: the OS seam (`ProcessSource`) and its procfs implementation
//! - `icons`: desktop-entry icon lookup
//! - `sampler`: the tiered per-process sampler
//! - `control`: start-time validated signalling

pub mod control;
pub mod icons;
pub mod sampler;
pub mod scanner;
pub mod stat;

pub use control::{
    ControlAction, ControlOutcome, KillSender, ProcessController, ProcessProbe, SignalSender,
    DEFAULT_START_TIME_TOLERANCE,
};
pub use icons::IconIndex;
pub use sampler::{map_run_state, ProcessSampler, ProcessSamplerConfig};
pub use scanner::{ProcessSource, ProcessStatus, ProcessUsage, ProcfsSource};
