//! Process listing and control endpoint handlers.
//!
//! Control requests carry the start time the client last saw for the pid and
//! are rejected when the live process no longer matches it.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use herakles_live_monitor::snapshot::ProcessSortKey;
use herakles_live_monitor::{ControlAction, ControlError, ControlToken};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::Ordering;
use tracing::{debug, info, instrument, warn};

use crate::state::SharedState;

/// Query parameters for the process list.
#[derive(Deserialize, Debug, Default)]
pub struct ProcessQuery {
    pub sort: Option<ProcessSortKey>,
    pub limit: Option<usize>,
    pub user: Option<String>,
}

/// Query parameters for a control request.
#[derive(Deserialize, Debug, Default)]
pub struct ControlQuery {
    pub start_time: Option<f64>,
}

/// Handler for the /api/processes endpoint.
#[instrument(skip(state))]
pub async fn processes_handler(
    State(state): State<SharedState>,
    Query(query): Query<ProcessQuery>,
) -> Response {
    debug!("Processing /api/processes request");
    state.record_http_request();

    let Some(mut list) = state.monitor.processes() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "no process sample published yet" })),
        )
            .into_response();
    };

    if let Some(user) = &query.user {
        list.processes.retain(|p| &p.user == user);
    }
    list.sort_by(query.sort.unwrap_or_default());
    if let Some(limit) = query.limit {
        list.processes.truncate(limit);
    }

    Json(list).into_response()
}

/// HTTP status for a rejected control request.
pub fn control_error_status(err: &ControlError) -> StatusCode {
    match err {
        ControlError::ProcessNotFound { .. } => StatusCode::NOT_FOUND,
        ControlError::ProcessChanged { .. } => StatusCode::CONFLICT,
        ControlError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        ControlError::InvalidTarget { .. } => StatusCode::BAD_REQUEST,
        ControlError::Os { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handler for POST /api/processes/{pid}/{action}.
#[instrument(skip(state))]
pub async fn control_handler(
    State(state): State<SharedState>,
    Path((pid, action)): Path<(u32, String)>,
    Query(query): Query<ControlQuery>,
) -> Response {
    state.record_http_request();
    state.control_requests.fetch_add(1, Ordering::Relaxed);

    if !state.control_enabled() {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "process control is disabled" })),
        )
            .into_response();
    }

    let action = match action.parse::<ControlAction>() {
        Ok(action) => action,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(json!({ "error": e }))).into_response(),
    };

    let Some(start_time) = query.start_time else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "start_time query parameter is required" })),
        )
            .into_response();
    };

    let token = ControlToken::new(pid, Some(start_time));
    let monitor = state.monitor.clone();
    // kill(2) and the /proc re-read are blocking
    let result = tokio::task::spawn_blocking(move || monitor.control(token, action)).await;

    match result {
        Ok(Ok(outcome)) => {
            info!("Control {} on pid {}: {:?}", action, pid, outcome);
            Json(json!({
                "pid": pid,
                "action": action,
                "outcome": outcome,
            }))
            .into_response()
        }
        Ok(Err(e)) => {
            warn!("Control {} on pid {} rejected: {}", action, pid, e);
            (
                control_error_status(&e),
                Json(json!({
                    "pid": pid,
                    "action": action,
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Control task for pid {} failed: {}", pid, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "control task failed" })),
            )
                .into_response()
        }
    }
}
