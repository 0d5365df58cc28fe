//! Startup requirement validation for herakles-live-monitor.
//!
//! This module validates that the monitor can read the procfs and sysfs
//! trees it samples and warns about reduced visibility without root.

use nix::unistd::geteuid;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

/// Validate all runtime requirements
pub fn validate_requirements(proc_root: &Path, sys_root: &Path) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges();
    check_proc_access(proc_root)?;
    check_sys_access(sys_root);

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Check if running with sufficient privileges
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - other users' processes show limited details");
        warn!("   and can only be signalled with CAP_KILL");
    } else {
        info!("✅ Running as root (uid=0)");
    }
}

/// The CPU and memory counters are required; everything else degrades.
fn check_proc_access(proc_root: &Path) -> Result<(), ValidationError> {
    for name in ["stat", "meminfo"] {
        let path = proc_root.join(name);
        if let Err(e) = fs::read_to_string(&path) {
            error!("❌ Cannot read {}: {}", path.display(), e);
            return Err(ValidationError::ProcUnreadable(format!(
                "{}: {}",
                path.display(),
                e
            )));
        }
    }

    // pid 1 is not readable in every container
    match fs::metadata(proc_root.join("1").join("stat")) {
        Ok(_) => info!("✅ {} access: process table readable", proc_root.display()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            warn!("⚠️  Cannot read process 1 - process list will be partial");
        }
        Err(e) => warn!("⚠️  Could not test process access: {}", e),
    }
    Ok(())
}

fn check_sys_access(sys_root: &Path) {
    for (dir, what) in [
        ("class/net", "network interfaces"),
        ("class/drm", "GPU devices"),
        ("devices/system/cpu", "CPU topology"),
    ] {
        if !sys_root.join(dir).exists() {
            warn!(
                "⚠️  {} not found - {} will not be reported",
                sys_root.join(dir).display(),
                what
            );
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("procfs not readable: {0}")]
    ProcUnreadable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_proc_counters_fail() {
        let dir = TempDir::new().unwrap();
        let err = validate_requirements(dir.path(), dir.path()).unwrap_err();
        assert!(err.to_string().contains("stat"));
    }

    #[test]
    fn test_readable_proc_passes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("stat"), "cpu  1 2 3 4\n").unwrap();
        fs::write(dir.path().join("meminfo"), "MemTotal: 1024 kB\n").unwrap();
        assert!(validate_requirements(dir.path(), dir.path()).is_ok());
    }
}
