//! HTTP endpoint handlers for the monitor.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Landing page
//! - `/health`: Sampler health
//! - `/config`: Configuration display endpoint
//! - `/api/snapshot`, `/api/topology`: Latest snapshots and core layout
//! - `/api/history`, `/api/history/{stream}`: Metric history
//! - `/api/processes`: Process list and validated control

pub mod config;
pub mod health;
pub mod history;
pub mod processes;
pub mod root;
pub mod snapshot;

// Re-export handlers
pub use config::config_handler;
pub use health::health_handler;
pub use history::{history_handler, history_index_handler};
pub use processes::{control_handler, processes_handler};
pub use root::root_handler;
pub use snapshot::{snapshot_handler, topology_handler};
