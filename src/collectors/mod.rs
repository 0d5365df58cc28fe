//! System-wide samplers.
//!
//! This module contains the samplers for global metrics: CPU ticks, virtual
//! memory, network interfaces, GPU devices and mounted volumes. Each sampler
//! owns its delta state exclusively and produces one snapshot per call.

pub mod cpu;
pub mod disk;
pub mod gpu;
pub mod memory;
pub mod network;

pub use cpu::CpuSampler;
pub use disk::DiskSampler;
pub use gpu::GpuSampler;
pub use memory::MemorySampler;
pub use network::NetworkSampler;

use crate::error::SampleResult;

/// A stateful source of one snapshot kind.
///
/// `sample` is a blocking call: it reads the OS counters synchronously and
/// folds them into the sampler's own state. An error means nothing is
/// published for this cycle.
pub trait Sampler: Send + 'static {
    type Output: Clone + Send + Sync + 'static;

    fn sample(&mut self) -> SampleResult<Self::Output>;
}
