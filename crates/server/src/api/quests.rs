//! Quest list, enrollment and start handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use questline_core::{EnrollmentSummary, Quest, QuestSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::handlers::{orchestrator_error, ApiError, MessageResponse};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// One quest as shown to the UI.
#[derive(Debug, Serialize)]
pub struct QuestResponse {
    pub id: String,
    pub name: String,
    /// "video", "stream", "play" or "unknown"
    pub task_type: String,
    pub target_seconds: f64,
    pub progress_seconds: f64,
    pub enrolled: bool,
    pub completed: bool,
    pub application_id: Option<String>,
}

impl From<&Quest> for QuestResponse {
    fn from(quest: &Quest) -> Self {
        Self {
            id: quest.id.clone(),
            name: quest.name().to_string(),
            task_type: quest.task_type().as_str().to_string(),
            target_seconds: quest.target_seconds(),
            progress_seconds: quest.progress_seconds(),
            enrolled: quest.is_enrolled(),
            completed: quest.is_completed(),
            application_id: quest.application_id().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListQuestsResponse {
    pub quests: Vec<QuestResponse>,
    pub total: usize,
}

impl From<&QuestSnapshot> for ListQuestsResponse {
    fn from(snapshot: &QuestSnapshot) -> Self {
        Self {
            quests: snapshot.as_slice().iter().map(QuestResponse::from).collect(),
            total: snapshot.len(),
        }
    }
}

/// Request body for bulk enrollment
#[derive(Debug, Default, Deserialize)]
pub struct EnrollAllBody {
    /// Quests to enroll in. Defaults to every open, unenrolled quest.
    pub quest_ids: Option<Vec<String>>,
}

/// Request body for starting a quest
#[derive(Debug, Default, Deserialize)]
pub struct StartQuestBody {
    /// Required by stream quests.
    pub stream_key: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List the current quest snapshot
pub async fn list_quests(State(state): State<Arc<AppState>>) -> Json<ListQuestsResponse> {
    let snapshot = state.orchestrator().quests().await;
    Json(ListQuestsResponse::from(&snapshot))
}

/// Re-fetch the quest list from the gateway
pub async fn refresh_quests(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListQuestsResponse>, ApiError> {
    let snapshot = state
        .orchestrator()
        .refresh_quests(false)
        .await
        .map_err(orchestrator_error)?;
    Ok(Json(ListQuestsResponse::from(&snapshot)))
}

/// Enroll in a single quest
pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .orchestrator()
        .enroll(&id)
        .await
        .map_err(orchestrator_error)?;
    Ok(MessageResponse::new(format!("Enrolled in quest {}", id)))
}

/// Enroll in several quests, one after another
pub async fn enroll_all(
    State(state): State<Arc<AppState>>,
    body: Option<Json<EnrollAllBody>>,
) -> Json<EnrollmentSummary> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let orchestrator = state.orchestrator();

    let quest_ids = match body.quest_ids {
        Some(ids) => ids,
        None => orchestrator
            .quests()
            .await
            .as_slice()
            .iter()
            .filter(|q| !q.is_enrolled() && !q.is_completed())
            .map(|q| q.id.clone())
            .collect(),
    };

    info!("Bulk enrolling in {} quests", quest_ids.len());
    Json(orchestrator.enroll_all(&quest_ids).await)
}

/// Start a quest from the snapshot; its kind follows its task type
pub async fn start_quest(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<StartQuestBody>>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    state
        .orchestrator()
        .start_quest(&id, body.stream_key.as_deref())
        .await
        .map_err(orchestrator_error)?;
    Ok((
        StatusCode::ACCEPTED,
        MessageResponse::new(format!("Quest {} started", id)),
    ))
}
