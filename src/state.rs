//! Application state shared by the HTTP handlers.

use herakles_live_monitor::Monitor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub monitor: Monitor,
    pub config: Arc<Config>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
    pub http_requests: AtomicU64,
    pub control_requests: AtomicU64,
}

impl AppState {
    pub fn new(monitor: Monitor, config: Arc<Config>) -> Self {
        Self {
            monitor,
            config,
            start_time: Instant::now(),
            http_requests: AtomicU64::new(0),
            control_requests: AtomicU64::new(0),
        }
    }

    pub fn record_http_request(&self) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn control_enabled(&self) -> bool {
        self.config.enable_control.unwrap_or(false)
    }
}
