//! Mounted volume capacity.
//!
//! Reads /proc/mounts, skips pseudo file systems and system mount points,
//! and queries each remaining mount with statvfs.

use ahash::AHashSet as HashSet;
use chrono::Utc;
use nix::sys::statvfs::statvfs;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::collectors::Sampler;
use crate::error::{SampleError, SampleResult};
use crate::snapshot::{DiskSnapshot, VolumeSnapshot};
use crate::system::read_attr;

/// Mount point prefixes hidden by default.
pub const DEFAULT_EXCLUDED_MOUNT_PREFIXES: &[&str] = &[
    "/proc",
    "/sys",
    "/dev",
    "/run",
    "/boot/efi",
    "/snap",
    "/var/lib/docker",
];

const PSEUDO_FS_TYPES: &[&str] = &[
    "proc",
    "sysfs",
    "devpts",
    "devtmpfs",
    "tmpfs",
    "cgroup",
    "cgroup2",
    "pstore",
    "bpf",
    "debugfs",
    "tracefs",
    "fusectl",
    "configfs",
    "securityfs",
    "hugetlbfs",
    "mqueue",
    "autofs",
    "binfmt_misc",
    "overlay",
    "squashfs",
    "nsfs",
    "ramfs",
    "efivarfs",
];

/// Capacity figures for one mount point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeUsage {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
}

/// One /proc/mounts entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: String,
    pub fstype: String,
}

/// Decodes the octal escapes the kernel uses for spaces, tabs, newlines and
/// backslashes in /proc/mounts.
pub fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits
                    .iter()
                    .fold(0u16, |acc, b| acc * 8 + u16::from(b - b'0'));
                if let Ok(v) = u8::try_from(value) {
                    out.push(v);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parses /proc/mounts content.
pub fn parse_mounts(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let device = parts.next()?;
            let mount_point = parts.next()?;
            let fstype = parts.next()?;
            Some(MountEntry {
                device: unescape_mount_field(device),
                mount_point: unescape_mount_field(mount_point),
                fstype: fstype.to_string(),
            })
        })
        .collect()
}

fn under_prefix(mount_point: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return false;
    }
    mount_point == prefix
        || mount_point
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Checks if a mount should be hidden based on type and mount point.
pub fn should_skip_mount(entry: &MountEntry, excluded_prefixes: &[String]) -> bool {
    if PSEUDO_FS_TYPES.contains(&entry.fstype.as_str()) {
        return true;
    }
    excluded_prefixes
        .iter()
        .any(|p| under_prefix(&entry.mount_point, p))
}

/// Resolves the removable and internal flags of a block device from sysfs.
///
/// Partitions carry no `removable` attribute of their own, so the parent
/// disk's attribute is consulted through the canonical sysfs path.
pub fn device_flags(sys_root: &Path, device: &str) -> (bool, bool) {
    let Some(name) = device.strip_prefix("/dev/") else {
        // network shares and other non-block sources
        return (false, false);
    };
    let block_dir = sys_root.join("class").join("block").join(name);
    let canonical = fs::canonicalize(&block_dir).unwrap_or_else(|_| block_dir.clone());

    let removable = read_attr(&canonical.join("removable"))
        .or_else(|| canonical.parent().and_then(|p| read_attr(&p.join("removable"))))
        .is_some_and(|v| v == "1");
    let on_usb = canonical.to_string_lossy().contains("/usb");

    (removable, !removable && !on_usb)
}

fn statvfs_usage(mount_point: &str) -> SampleResult<VolumeUsage> {
    let stat = statvfs(mount_point).map_err(|e| SampleError::io(mount_point, e.into()))?;
    let block_size = stat.fragment_size() as u64;
    Ok(VolumeUsage {
        total_bytes: block_size * stat.blocks() as u64,
        free_bytes: block_size * stat.blocks_free() as u64,
        available_bytes: block_size * stat.blocks_available() as u64,
    })
}

/// Builds the volume list from mount entries using `stat` for capacities.
///
/// Mounts that cannot be queried or report zero capacity are left out. When
/// a device is mounted more than once only its first mount is kept.
pub fn collect_volumes<F>(
    mounts: &[MountEntry],
    sys_root: &Path,
    excluded_prefixes: &[String],
    stat: F,
) -> Vec<VolumeSnapshot>
where
    F: Fn(&str) -> SampleResult<VolumeUsage>,
{
    let mut seen_devices = HashSet::new();
    let mut volumes = Vec::new();

    for entry in mounts {
        if should_skip_mount(entry, excluded_prefixes) {
            continue;
        }
        if seen_devices.contains(&entry.device) {
            continue;
        }

        let usage = match stat(&entry.mount_point) {
            Ok(u) if u.total_bytes > 0 => u,
            Ok(_) => continue,
            Err(e) => {
                trace!("Skipping mount {}: {}", entry.mount_point, e);
                continue;
            }
        };

        seen_devices.insert(entry.device.clone());
        let (is_removable, is_internal) = device_flags(sys_root, &entry.device);
        volumes.push(VolumeSnapshot {
            device: entry.device.clone(),
            mount_point: entry.mount_point.clone(),
            fstype: entry.fstype.clone(),
            total_bytes: usage.total_bytes,
            free_bytes: usage.free_bytes.min(usage.total_bytes),
            available_bytes: usage.available_bytes.min(usage.total_bytes),
            is_removable,
            is_internal,
        });
    }

    volumes.sort_by(|a, b| a.mount_point.cmp(&b.mount_point));
    volumes
}

/// Stateless volume sampler.
pub struct DiskSampler {
    proc_root: PathBuf,
    sys_root: PathBuf,
    excluded_prefixes: Vec<String>,
}

impl DiskSampler {
    pub fn new(
        proc_root: impl Into<PathBuf>,
        sys_root: impl Into<PathBuf>,
        excluded_prefixes: Vec<String>,
    ) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
            excluded_prefixes,
        }
    }

    /// Uses [`DEFAULT_EXCLUDED_MOUNT_PREFIXES`].
    pub fn with_default_exclusions(
        proc_root: impl Into<PathBuf>,
        sys_root: impl Into<PathBuf>,
    ) -> Self {
        Self::new(
            proc_root,
            sys_root,
            DEFAULT_EXCLUDED_MOUNT_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

impl Sampler for DiskSampler {
    type Output = DiskSnapshot;

    fn sample(&mut self) -> SampleResult<DiskSnapshot> {
        let content = crate::system::read_file(&self.proc_root.join("mounts"))?;
        let mounts = parse_mounts(&content);
        let volumes = collect_volumes(
            &mounts,
            &self.sys_root,
            &self.excluded_prefixes,
            statvfs_usage,
        );
        debug!("Disk sample: {} volumes", volumes.len());
        Ok(DiskSnapshot {
            captured_at: Utc::now(),
            volumes,
        })
    }
}
