//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays
//! a landing page with all available endpoints and descriptions.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.record_http_request();

    let version = env!("CARGO_PKG_VERSION");

    // Calculate actual uptime from service start time
    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Herakles Live Monitor</title>
    <style>
        body {{ font-family: system-ui, sans-serif; margin: 0; padding: 24px; background: #f4f6f8; }}
        main {{ max-width: 860px; margin: 0 auto; background: #fff; padding: 32px; border-radius: 6px; }}
        h1 {{ margin-top: 0; border-bottom: 2px solid #2b7a4b; padding-bottom: 12px; }}
        .subtitle {{ color: #555; }}
        .info span {{ display: inline-block; margin-right: 32px; color: #2b7a4b; }}
        .endpoint-list {{ list-style: none; padding: 0; }}
        .endpoint-list li {{ margin: 14px 0; padding: 12px; border-left: 3px solid #2b7a4b; background: #f8faf9; }}
        .endpoint-list a {{ color: #2b7a4b; font-weight: 600; text-decoration: none; }}
        .endpoint-desc {{ color: #666; margin-top: 4px; }}
        .footer {{ margin-top: 32px; color: #777; font-size: 0.9em; text-align: center; }}
        code {{ background: #eef1f3; padding: 1px 5px; border-radius: 3px; }}
    </style>
</head>
<body>
<main>
    <h1>Herakles Live Monitor</h1>
    <p class="subtitle">Live process, CPU, memory, network, GPU and volume telemetry</p>

    <p class="info">
        <span>Version {version}</span>
        <span>Uptime {uptime}</span>
        <span>Cycle {cycle}</span>
    </p>

    <h2>Available Endpoints</h2>
    <ul class="endpoint-list">
        <li>
            <a href="/health">/health</a>
            <div class="endpoint-desc">Sampler health: successes, failures, busy skips and durations (text)</div>
        </li>
        <li>
            <a href="/config">/config</a>
            <div class="endpoint-desc">Active runtime configuration (read-only)</div>
        </li>
        <li>
            <a href="/api/snapshot">/api/snapshot</a>
            <div class="endpoint-desc">Latest CPU, memory, network, GPU, volume and process snapshots (JSON)</div>
        </li>
        <li>
            <a href="/api/topology">/api/topology</a>
            <div class="endpoint-desc">Detected core layout (JSON)</div>
        </li>
        <li>
            <a href="/api/processes">/api/processes</a>
            <div class="endpoint-desc">Process list, sortable with <code>?sort=cpu|memory|name|pid&amp;limit=N</code></div>
        </li>
        <li>
            <a href="/api/history">/api/history</a>
            <div class="endpoint-desc">History statistics; <code>/api/history/{{stream}}</code> returns one stream's points</div>
        </li>
        <li>
            <code>POST /api/processes/{{pid}}/{{action}}?start_time=...</code>
            <div class="endpoint-desc">Validated terminate, force-kill, suspend or resume ({control})</div>
        </li>
    </ul>

    <div class="footer">
        <p>{footer}</p>
    </div>
</main>
</body>
</html>"#,
        version = version,
        cycle = state.monitor.cycle(),
        uptime = uptime_str,
        control = if state.control_enabled() { "enabled" } else { "disabled" },
        footer = FOOTER_TEXT
    );

    Html(html)
}
