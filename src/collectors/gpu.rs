//! GPU utilization and memory.
//!
//! Devices are detected once from /sys/class/drm (and through NVML when the
//! `nvml` feature is enabled). Discrete devices report dedicated VRAM;
//! unified-memory devices report system memory usage as a proxy since there
//! is no separate pool.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::collectors::Sampler;
use crate::error::{SampleError, SampleResult};
use crate::rate::{clamp_percent, ratio_percent};
use crate::snapshot::{GpuKind, GpuSnapshot};
use crate::system::{self, meminfo_bytes, read_attr, read_attr_u64};

/// VRAM above this marks a DRM device as discrete. APUs expose a small
/// carve-out through the same attribute.
const DISCRETE_VRAM_THRESHOLD: u64 = 1024 * 1024 * 1024;

#[cfg(feature = "nvml")]
use once_cell::sync::Lazy;

#[cfg(feature = "nvml")]
use nvml_wrapper::Nvml;

/// NVML must be initialized once per process.
#[cfg(feature = "nvml")]
static NVML: Lazy<Option<Nvml>> = Lazy::new(|| Nvml::init().ok());

#[derive(Debug, Clone, PartialEq, Eq)]
enum Backend {
    Drm { device_dir: PathBuf },
    #[cfg(feature = "nvml")]
    Nvml { index: u32 },
}

/// A detected accelerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuDevice {
    pub name: String,
    pub kind: GpuKind,
    backend: Backend,
}

fn vendor_name(vendor_id: &str) -> Option<&'static str> {
    match vendor_id {
        "0x1002" => Some("AMD"),
        "0x10de" => Some("NVIDIA"),
        "0x8086" => Some("Intel"),
        "0x13b5" => Some("ARM"),
        "0x5143" => Some("Qualcomm"),
        _ => None,
    }
}

fn is_card_dir(name: &str) -> bool {
    name.strip_prefix("card")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Enumerates DRM cards under `<sys_root>/class/drm`, discrete devices first.
pub fn detect_drm_devices(sys_root: &Path) -> Vec<GpuDevice> {
    let mut devices = Vec::new();
    let Ok(entries) = fs::read_dir(sys_root.join("class").join("drm")) else {
        return devices;
    };

    let mut cards: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_card_dir)
        })
        .collect();
    cards.sort();

    for card in cards {
        let device_dir = card.join("device");
        if !device_dir.exists() {
            continue;
        }

        let driver = fs::read_link(device_dir.join("driver"))
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "unknown".to_string());
        let vendor = read_attr(&device_dir.join("vendor"));
        let vram_total = read_attr_u64(&device_dir.join("mem_info_vram_total")).unwrap_or(0);

        let kind = if vram_total > DISCRETE_VRAM_THRESHOLD || driver == "nvidia" || driver == "nouveau"
        {
            GpuKind::Discrete
        } else {
            GpuKind::UnifiedMemory
        };
        let name = match vendor.as_deref().and_then(vendor_name) {
            Some(v) => format!("{} {}", v, driver),
            None => driver,
        };

        devices.push(GpuDevice {
            name,
            kind,
            backend: Backend::Drm { device_dir },
        });
    }

    devices.sort_by_key(|d| d.kind != GpuKind::Discrete);
    devices
}

#[cfg(feature = "nvml")]
fn detect_nvml_device() -> Option<GpuDevice> {
    let nvml = NVML.as_ref()?;
    if nvml.device_count().ok()? == 0 {
        return None;
    }
    let device = nvml.device_by_index(0).ok()?;
    Some(GpuDevice {
        name: device.name().unwrap_or_else(|_| "NVIDIA GPU".to_string()),
        kind: GpuKind::Discrete,
        backend: Backend::Nvml { index: 0 },
    })
}

/// Sampler for the primary accelerator.
pub struct GpuSampler {
    proc_root: PathBuf,
    device: Option<GpuDevice>,
}

impl GpuSampler {
    /// Detects the accelerator topology once.
    pub fn new(proc_root: impl Into<PathBuf>, sys_root: &Path) -> Self {
        #[cfg(feature = "nvml")]
        let device = detect_nvml_device().or_else(|| detect_drm_devices(sys_root).into_iter().next());
        #[cfg(not(feature = "nvml"))]
        let device = detect_drm_devices(sys_root).into_iter().next();

        match &device {
            Some(d) => info!("GPU detected: {} ({:?})", d.name, d.kind),
            None => info!("No GPU device detected"),
        }

        Self {
            proc_root: proc_root.into(),
            device,
        }
    }

    pub fn device(&self) -> Option<&GpuDevice> {
        self.device.as_ref()
    }

    fn system_memory(&self) -> SampleResult<(u64, u64)> {
        let meminfo = system::read_file(&self.proc_root.join("meminfo"))?;
        let total = meminfo_bytes(&meminfo, "MemTotal")
            .ok_or_else(|| SampleError::parse("/proc/meminfo", "missing MemTotal"))?;
        let available = meminfo_bytes(&meminfo, "MemAvailable").unwrap_or(0);
        Ok((total.saturating_sub(available), total))
    }

    fn sample_drm(&self, device: &GpuDevice, device_dir: &Path) -> SampleResult<GpuSnapshot> {
        let utilization_percent = read_attr_u64(&device_dir.join("gpu_busy_percent"))
            .map(|v| clamp_percent(v as f64, 100.0));

        let (memory_used_bytes, memory_total_bytes) = match device.kind {
            GpuKind::Discrete => (
                read_attr_u64(&device_dir.join("mem_info_vram_used")),
                read_attr_u64(&device_dir.join("mem_info_vram_total")),
            ),
            GpuKind::UnifiedMemory => {
                let (used, total) = self.system_memory()?;
                (Some(used), Some(total))
            }
        };

        Ok(GpuSnapshot {
            captured_at: Utc::now(),
            name: device.name.clone(),
            kind: device.kind,
            utilization_percent,
            memory_used_bytes,
            memory_total_bytes,
            memory_percent: match (memory_used_bytes, memory_total_bytes) {
                (Some(used), Some(total)) => ratio_percent(used, total),
                _ => 0.0,
            },
        })
    }

    #[cfg(feature = "nvml")]
    fn sample_nvml(&self, device: &GpuDevice, index: u32) -> SampleResult<GpuSnapshot> {
        let nvml = NVML.as_ref().ok_or(SampleError::Unavailable("NVML"))?;
        let handle = nvml
            .device_by_index(index)
            .map_err(|e| SampleError::parse("NVML device", e.to_string()))?;
        let utilization_percent = handle
            .utilization_rates()
            .ok()
            .map(|u| clamp_percent(u.gpu as f64, 100.0));
        let memory = handle.memory_info().ok();

        Ok(GpuSnapshot {
            captured_at: Utc::now(),
            name: device.name.clone(),
            kind: device.kind,
            utilization_percent,
            memory_used_bytes: memory.as_ref().map(|m| m.used),
            memory_total_bytes: memory.as_ref().map(|m| m.total),
            memory_percent: memory
                .as_ref()
                .map(|m| ratio_percent(m.used, m.total))
                .unwrap_or(0.0),
        })
    }
}

impl Sampler for GpuSampler {
    type Output = GpuSnapshot;

    fn sample(&mut self) -> SampleResult<GpuSnapshot> {
        let device = self.device.as_ref().ok_or(SampleError::Unavailable("gpu"))?;
        let snapshot = match &device.backend {
            Backend::Drm { device_dir } => self.sample_drm(device, device_dir)?,
            #[cfg(feature = "nvml")]
            Backend::Nvml { index } => self.sample_nvml(device, *index)?,
        };
        debug!(
            "GPU sample: {} utilization {:?}, memory {:.1}%",
            snapshot.name, snapshot.utilization_percent, snapshot.memory_percent
        );
        Ok(snapshot)
    }
}
