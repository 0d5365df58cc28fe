//! History endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use herakles_live_monitor::MetricStream;
use serde_json::json;
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the /api/history endpoint: store statistics and stream names.
#[instrument(skip(state))]
pub async fn history_index_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /api/history request");
    state.record_http_request();

    let streams: Vec<&str> = MetricStream::ALL.iter().map(|s| s.as_str()).collect();
    Json(json!({
        "stats": state.monitor.history_stats(),
        "streams": streams,
    }))
}

/// Handler for the /api/history/{stream} endpoint.
#[instrument(skip(state))]
pub async fn history_handler(
    State(state): State<SharedState>,
    Path(stream): Path<String>,
) -> Response {
    debug!("Processing /api/history/{} request", stream);
    state.record_http_request();

    match stream.parse::<MetricStream>() {
        Ok(stream) => {
            let points = state.monitor.history(stream);
            Json(json!({
                "stream": stream,
                "capacity": state.monitor.history_stats().capacity_per_stream,
                "points": points,
            }))
            .into_response()
        }
        Err(e) => (StatusCode::NOT_FOUND, Json(json!({ "error": e }))).into_response(),
    }
}
