//! CLI arguments and subcommands for herakles-live-monitor.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use herakles_live_monitor::{ControlAction, MetricStream};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Output format for the snapshot command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-live-monitor",
    about = "Live system telemetry for Linux: processes, CPU, memory, network, GPU and volumes",
    long_about = "Live system telemetry for Linux.\n\n\
                  Samples per-process CPU and memory, per-core CPU usage, virtual memory, \
                  network throughput, GPU utilization and volume usage on a tiered schedule, \
                  keeps a bounded history per metric and serves everything over a small \
                  HTTP API with validated process control.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/cansp-dev/herakles-live-monitor - More info: https://www.herakles.now - Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Print only the loaded user config file + full path and exit
    #[arg(long)]
    pub show_user_config: bool,

    /// Output format for --show-config*
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Sampling cycle period in milliseconds
    #[arg(short = 'i', long)]
    pub interval_ms: Option<u64>,

    /// Points kept per history stream
    #[arg(long)]
    pub history_points: Option<usize>,

    /// Root of the procfs mount (for containers or tests)
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Root of the sysfs mount (for containers or tests)
    #[arg(long)]
    pub sys_root: Option<PathBuf>,

    /// Accept process control requests on the HTTP API
    #[arg(long)]
    pub enable_control: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sample for a few cycles and print the latest snapshots
    Snapshot {
        /// Cycles to run after the baseline pass
        #[arg(short = 'n', long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
        cycles: u64,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Print only the history of this stream
        #[arg(long)]
        history: Option<MetricStream>,

        /// Keep only the N busiest processes
        #[arg(long)]
        top: Option<usize>,
    },

    /// Send a validated control signal to a process
    Signal {
        /// Target process id
        pid: u32,

        /// Action to perform
        #[arg(value_enum)]
        action: ControlAction,

        /// Start time (seconds since the epoch) the process is expected to have
        #[arg(long)]
        start_time: Option<f64>,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Check runtime requirements and permissions
    CheckRequirements,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_flags() {
        let args = Args::try_parse_from([
            "herakles-live-monitor",
            "-p",
            "9300",
            "--interval-ms",
            "500",
            "--history-points",
            "120",
            "--enable-control",
        ])
        .expect("flags should parse");
        assert_eq!(args.port, Some(9300));
        assert_eq!(args.interval_ms, Some(500));
        assert_eq!(args.history_points, Some(120));
        assert!(args.enable_control);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_parse_signal_command() {
        let args = Args::try_parse_from([
            "herakles-live-monitor",
            "signal",
            "4242",
            "force-kill",
            "--start-time",
            "1700000000.5",
        ])
        .expect("signal should parse");
        match args.command {
            Some(Commands::Signal {
                pid,
                action,
                start_time,
            }) => {
                assert_eq!(pid, 4242);
                assert_eq!(action, ControlAction::ForceKill);
                assert_eq!(start_time, Some(1_700_000_000.5));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_snapshot_history_stream() {
        let args = Args::try_parse_from([
            "herakles-live-monitor",
            "snapshot",
            "-n",
            "2",
            "--history",
            "network",
        ])
        .expect("snapshot should parse");
        match args.command {
            Some(Commands::Snapshot {
                cycles, history, ..
            }) => {
                assert_eq!(cycles, 2);
                assert_eq!(history, Some(MetricStream::Network));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_needs_at_least_one_cycle() {
        let result = Args::try_parse_from(["herakles-live-monitor", "snapshot", "-n", "0"]);
        assert!(result.is_err());
    }
}
