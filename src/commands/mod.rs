//! CLI command implementations for herakles-live-monitor.
//!
//! This module provides implementations for all CLI subcommands:
//! - `snapshot`: Sample a few cycles and print the result
//! - `signal`: Validated process control
//! - `config`: Configuration file generation

pub mod config;
pub mod signal;
pub mod snapshot;

// Re-export command functions
pub use config::command_config;
pub use signal::command_signal;
pub use snapshot::command_snapshot;
