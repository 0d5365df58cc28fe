//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! per-sampler statistics and history usage.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use herakles_live_monitor::{HistoryStats, MonitorState};
use std::fmt::Write as FmtWrite;
use std::sync::atomic::Ordering;
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "Project: https://github.com/cansp-dev/herakles-live-monitor - More info: https://www.herakles.now - Support: exporter@herakles.now";

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");
    state.record_http_request();

    let monitor = &state.monitor;
    let running = monitor.state() == MonitorState::Running;
    let healthy = monitor.samplers_healthy();

    let status = if running && healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let message = match (running, healthy) {
        (true, true) => "OK",
        (true, false) => "Waiting for first samples",
        (false, _) => "Monitor stopped",
    };

    let uptime_hours = state.start_time.elapsed().as_secs() as f64 / SECONDS_PER_HOUR;
    let uptime_str = if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    };

    let table = monitor.sampler_stats_table();
    let history_section = render_history(&monitor.history_stats());

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nUptime: {uptime_str}\nCycle: {cycle}\nHTTP requests: {http}\nControl requests: {control}\n\n{table}\n{history_section}\n{FOOTER_TEXT}",
            cycle = monitor.cycle(),
            http = state.http_requests.load(Ordering::Relaxed),
            control = state.control_requests.load(Ordering::Relaxed),
        ),
    )
}

/// Renders history store usage as a plain-text block.
fn render_history(stats: &HistoryStats) -> String {
    let mut out = String::new();
    writeln!(out, "HISTORY").ok();
    writeln!(out, "=======").ok();
    writeln!(out).ok();
    writeln!(out, "Streams:            {}", stats.streams).ok();
    writeln!(out, "Points per stream:  {}", stats.capacity_per_stream).ok();
    writeln!(out, "Interval:           {} ms", stats.interval_ms).ok();
    writeln!(out, "Window:             {} s", stats.history_seconds).ok();
    writeln!(out, "Points stored:      {}", stats.total_points).ok();
    out
}
