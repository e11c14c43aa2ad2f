//! Session status and stop handlers.

use axum::{extract::State, Json};
use questline_core::SessionStatus;
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StopResponse {
    /// False when there was no active session to stop.
    pub stopped: bool,
}

/// Current session, queue and flag snapshot
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SessionStatus> {
    Json(state.orchestrator().status().await)
}

/// Stop the active session (and halt a running queue)
pub async fn stop(State(state): State<Arc<AppState>>) -> Json<StopResponse> {
    let stopped = state.orchestrator().stop().await;
    Json(StopResponse { stopped })
}
