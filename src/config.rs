//! Configuration management for herakles-live-monitor.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use herakles_live_monitor::collectors::disk::DEFAULT_EXCLUDED_MOUNT_PREFIXES;
use herakles_live_monitor::history::DEFAULT_HISTORY_CAPACITY;
use herakles_live_monitor::monitor::DEFAULT_INTERVAL_MS;
use herakles_live_monitor::process::{ProcessSamplerConfig, DEFAULT_START_TIME_TOLERANCE};
use herakles_live_monitor::system::{DEFAULT_PROC_ROOT, DEFAULT_SYS_ROOT};
use herakles_live_monitor::{MonitorConfig, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;

/// Shortest accepted cycle period.
pub const MIN_INTERVAL_MS: u64 = 100;
/// Largest accepted history length per stream.
pub const MAX_HISTORY_POINTS: usize = 86_400;

/// Sampling cadence and sampler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Cycle period in milliseconds (default: 1000)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Mount point prefixes never reported as volumes
    #[serde(default = "default_excluded_mount_prefixes")]
    pub excluded_mount_prefixes: Vec<String>,

    /// Seconds a control request's expected start time may differ (default: 0.5)
    #[serde(default = "default_start_time_tolerance")]
    pub start_time_tolerance: f64,

    /// How often processes, disks and GPUs are sampled
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Process refresh tiering and state thresholds
    #[serde(default)]
    pub processes: ProcessSamplerConfig,
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}
fn default_excluded_mount_prefixes() -> Vec<String> {
    DEFAULT_EXCLUDED_MOUNT_PREFIXES
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_start_time_tolerance() -> f64 {
    DEFAULT_START_TIME_TOLERANCE
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            excluded_mount_prefixes: default_excluded_mount_prefixes(),
            start_time_tolerance: default_start_time_tolerance(),
            scheduler: SchedulerConfig::default(),
            processes: ProcessSamplerConfig::default(),
        }
    }
}

/// History configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Points kept per metric stream (default: 60)
    #[serde(default = "default_history_points")]
    pub points: usize,
}

fn default_history_points() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            points: default_history_points(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server Configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Logging Configuration
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    // Feature Flags
    #[serde(alias = "enable-control")]
    pub enable_control: Option<bool>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,

    // Data sources
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,
    #[serde(alias = "sys-root")]
    pub sys_root: Option<PathBuf>,

    // Sampling Configuration
    #[serde(default)]
    pub sampling: SamplingConfig,

    // History Configuration
    #[serde(default)]
    pub history: HistoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            log_level: Some("info".into()),
            enable_control: Some(false),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            sys_root: Some(PathBuf::from(DEFAULT_SYS_ROOT)),
            sampling: SamplingConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Config {
    /// The library-level monitor configuration this file describes.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval_ms: self.sampling.interval_ms,
            history_capacity: self.history.points,
            scheduler: self.sampling.scheduler.clone(),
            processes: self.sampling.processes.clone(),
            proc_root: self
                .proc_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT)),
            sys_root: self
                .sys_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SYS_ROOT)),
            excluded_mount_prefixes: self.sampling.excluded_mount_prefixes.clone(),
            start_time_tolerance: self.sampling.start_time_tolerance,
        }
    }
}

fn check_threshold(name: &str, value: f64) -> Result<(), Box<dyn std::error::Error>> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{} must be a finite, non-negative number (got {})", name, value).into());
    }
    Ok(())
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let sampling = &cfg.sampling;

    if sampling.interval_ms < MIN_INTERVAL_MS {
        return Err(format!(
            "sampling.interval_ms must be at least {} (got {})",
            MIN_INTERVAL_MS, sampling.interval_ms
        )
        .into());
    }

    if cfg.history.points == 0 || cfg.history.points > MAX_HISTORY_POINTS {
        return Err(format!(
            "history.points must be between 1 and {} (got {})",
            MAX_HISTORY_POINTS, cfg.history.points
        )
        .into());
    }

    if sampling.scheduler.process_every_cycles == 0 || sampling.scheduler.slow_every_cycles == 0 {
        return Err("sampling.scheduler cadences must be at least 1 cycle".into());
    }

    if sampling.processes.full_refresh_every == 0 {
        return Err("sampling.processes.full_refresh_every must be at least 1".into());
    }

    check_threshold(
        "sampling.processes.active_cpu_threshold",
        sampling.processes.active_cpu_threshold,
    )?;
    check_threshold(
        "sampling.processes.running_cpu_threshold",
        sampling.processes.running_cpu_threshold,
    )?;
    check_threshold(
        "sampling.start_time_tolerance",
        sampling.start_time_tolerance,
    )?;

    if let Some(prefix) = sampling
        .excluded_mount_prefixes
        .iter()
        .find(|p| !p.starts_with('/'))
    {
        return Err(format!("Excluded mount prefix '{}' must be an absolute path", prefix).into());
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file("certificate", cert)?;
                check_pem_file("private key", key)?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(what: &str, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", what, path).into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {} file not found: {}", what, path).into())
        }
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", what, path, e).into()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(interval_ms) = args.interval_ms {
        config.sampling.interval_ms = interval_ms;
    }
    if let Some(points) = args.history_points {
        config.history.points = points;
    }
    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(root) = &args.sys_root {
        config.sys_root = Some(root.clone());
    }

    if args.enable_control {
        config.enable_control = Some(true);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Default file locations tried when no config path is given.
const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/herakles/live-monitor.yaml",
    "/etc/herakles/live-monitor.yml",
    "/etc/herakles/live-monitor.json",
    "./herakles-live-monitor.yaml",
    "./herakles-live-monitor.yml",
    "./herakles-live-monitor.json",
];

/// Loads a config file, trying the default locations when `path` is `None`.
///
/// A missing file yields the default configuration.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        },
    };

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;
    parse_config(&content, &path)
}

fn parse_config(content: &str, path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(
    config: &Config,
    format: ConfigFormat,
    user_config: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = render_config(config, &format)?;

    if user_config {
        println!("User configuration (effective values):");
    }
    println!("{output}");
    Ok(())
}
