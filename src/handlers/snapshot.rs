//! Snapshot endpoint handlers.
//!
//! `/api/snapshot` returns the latest published value of every metric,
//! `/api/topology` the core layout detected at startup.

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the /api/snapshot endpoint.
#[instrument(skip(state))]
pub async fn snapshot_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /api/snapshot request");
    state.record_http_request();

    let latest = state.monitor.latest();
    Json(json!({
        "state": state.monitor.state(),
        "snapshots": latest,
    }))
}

/// Handler for the /api/topology endpoint.
#[instrument(skip(state))]
pub async fn topology_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /api/topology request");
    state.record_http_request();

    Json(state.monitor.topology().clone())
}
