//! Configuration display endpoint handler.
//!
//! This module provides the `/config` endpoint handler that displays
//! the current monitor configuration.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::config::{DEFAULT_BIND_ADDR, DEFAULT_PORT};
use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /config endpoint.
#[instrument(skip(state))]
pub async fn config_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /config request");
    state.record_http_request();

    let cfg = &state.config;
    let effective = state.monitor.config();

    let mut out = String::new();

    writeln!(out, "HERAKLES LIVE MONITOR - CONFIGURATION").ok();
    writeln!(out, "=====================================").ok();
    writeln!(out).ok();

    writeln!(out, "SERVER CONFIGURATION").ok();
    writeln!(out, "--------------------").ok();
    writeln!(
        out,
        "bind:                       {}",
        cfg.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    )
    .ok();
    writeln!(
        out,
        "port:                       {}",
        cfg.port.unwrap_or(DEFAULT_PORT)
    )
    .ok();
    writeln!(
        out,
        "enable_control:             {}",
        state.control_enabled()
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "TLS/SSL CONFIGURATION").ok();
    writeln!(out, "---------------------").ok();
    writeln!(
        out,
        "enable_tls:                 {}",
        cfg.enable_tls.unwrap_or(false)
    )
    .ok();
    writeln!(
        out,
        "tls_cert_path:              {}",
        cfg.tls_cert_path.as_deref().unwrap_or("none")
    )
    .ok();
    writeln!(
        out,
        "tls_key_path:               {}",
        cfg.tls_key_path.as_deref().unwrap_or("none")
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "SAMPLING").ok();
    writeln!(out, "--------").ok();
    writeln!(out, "proc_root:                  {}", effective.proc_root.display()).ok();
    writeln!(out, "sys_root:                   {}", effective.sys_root.display()).ok();
    writeln!(out, "interval_ms:                {}", effective.interval_ms).ok();
    writeln!(
        out,
        "process_every_cycles:       {}",
        effective.scheduler.process_every_cycles
    )
    .ok();
    writeln!(
        out,
        "slow_every_cycles:          {}",
        effective.scheduler.slow_every_cycles
    )
    .ok();
    writeln!(
        out,
        "full_refresh_warmup:        {}",
        effective.processes.full_refresh_warmup
    )
    .ok();
    writeln!(
        out,
        "full_refresh_every:         {}",
        effective.processes.full_refresh_every
    )
    .ok();
    writeln!(
        out,
        "active_cpu_threshold:       {}",
        effective.processes.active_cpu_threshold
    )
    .ok();
    writeln!(
        out,
        "running_cpu_threshold:      {}",
        effective.processes.running_cpu_threshold
    )
    .ok();
    writeln!(
        out,
        "start_time_tolerance:       {} s",
        effective.start_time_tolerance
    )
    .ok();
    writeln!(
        out,
        "excluded_mount_prefixes:    {}",
        effective.excluded_mount_prefixes.join(", ")
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "HISTORY").ok();
    writeln!(out, "-------").ok();
    writeln!(out, "points:                     {}", effective.history_capacity).ok();
    writeln!(out).ok();

    writeln!(out, "LOGGING").ok();
    writeln!(out, "-------").ok();
    writeln!(
        out,
        "log_level:                  {}",
        cfg.log_level.as_deref().unwrap_or("info")
    )
    .ok();
    writeln!(out).ok();
    writeln!(out, "{FOOTER_TEXT}").ok();

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        out,
    )
}
