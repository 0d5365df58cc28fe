//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("herakles-live-monitor.yaml"));

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Live Monitor Configuration
# ===================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                   # HTTP port
# enable_control: false        # Accept POST /api/processes/{pid}/{action}?start_time=
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false            # Enable HTTPS
# tls_cert_path: null          # Path to TLS certificate (PEM format)
# tls_key_path: null           # Path to TLS private key (PEM format)
#
# Data Sources
# ------------
# proc_root: /proc             # procfs mount
# sys_root: /sys               # sysfs mount
#
# Sampling
# --------
# sampling:
#   interval_ms: 1000          # Cycle period; CPU, memory and network every cycle
#   excluded_mount_prefixes:   # Mounts never reported as volumes
#   start_time_tolerance: 0.5  # Seconds; larger differences mean the pid was reused
#   scheduler:
#     process_every_cycles: 2  # Processes every Nth cycle
#     slow_every_cycles: 3     # Disks and GPUs every Nth cycle
#   processes:
#     full_refresh_warmup: 3   # First N process samples refresh everything
#     full_refresh_every: 3    # Then every Nth sample is a full refresh
#     active_cpu_threshold: 0.5   # CPU % above which a process is measured every sample
#     running_cpu_threshold: 0.1  # CPU % above which a runnable process shows as running
#
# History
# -------
# history:
#   points: 60                 # Points kept per metric stream
"#;

    format!("{comments}\n{yaml}")
}
