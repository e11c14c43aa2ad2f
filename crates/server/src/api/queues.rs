//! Video and play queue handlers.
//!
//! Every route takes the queue name (`video` or `play`) as its first path
//! segment.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use questline_core::{orchestrator::QueueStatus, QueueKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::handlers::{error_response, orchestrator_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EnqueueBody {
    pub quest_id: String,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    /// False when the quest was already queued.
    pub added: bool,
    pub queue: QueueStatus,
}

fn parse_kind(name: &str) -> Result<QueueKind, ApiError> {
    QueueKind::parse(name).ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            format!("Unknown queue: {} (expected 'video' or 'play')", name),
        )
    })
}

/// Get a queue's contents and running flag
pub async fn get_queue(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<QueueStatus>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.orchestrator().queue_status(kind).await))
}

/// Append a quest from the snapshot to a queue
pub async fn add_to_queue(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(body): Json<EnqueueBody>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let orchestrator = state.orchestrator();
    let added = orchestrator
        .enqueue_by_id(kind, &body.quest_id)
        .await
        .map_err(orchestrator_error)?;
    Ok(Json(EnqueueResponse {
        added,
        queue: orchestrator.queue_status(kind).await,
    }))
}

/// Run a queue from its head
pub async fn start_queue(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<QueueStatus>, ApiError> {
    let kind = parse_kind(&kind)?;
    let orchestrator = state.orchestrator();
    orchestrator
        .start_queue(kind)
        .await
        .map_err(orchestrator_error)?;
    Ok(Json(orchestrator.queue_status(kind).await))
}

/// Empty a queue and stop whatever session is running
pub async fn clear_queue(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<QueueStatus>, ApiError> {
    let kind = parse_kind(&kind)?;
    let orchestrator = state.orchestrator();
    orchestrator.clear_queue(kind).await;
    Ok(Json(orchestrator.queue_status(kind).await))
}
