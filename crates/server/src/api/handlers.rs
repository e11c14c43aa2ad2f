use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use questline_core::{OrchestratorError, PreferenceError, SanitizedConfig};
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error body shared by every API handler.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Simple message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map an orchestrator error onto an HTTP status.
pub fn orchestrator_error(err: OrchestratorError) -> ApiError {
    let status = match &err {
        OrchestratorError::QuestNotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::CatalogMiss(_)
        | OrchestratorError::MissingApplication(_)
        | OrchestratorError::UnsupportedTask { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        OrchestratorError::SessionBusy | OrchestratorError::QueueBusy(_) => StatusCode::CONFLICT,
        OrchestratorError::StartFailure { .. } | OrchestratorError::Gateway(_) => {
            StatusCode::BAD_GATEWAY
        }
        OrchestratorError::Preferences(PreferenceError::Database(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        OrchestratorError::Preferences(_) => StatusCode::BAD_REQUEST,
    };
    error_response(status, err.to_string())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Prometheus scrape endpoint.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use questline_core::{ExecutorError, QueueKind};

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            orchestrator_error(OrchestratorError::QuestNotFound("q".into())).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            orchestrator_error(OrchestratorError::QueueBusy(QueueKind::Play)).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            orchestrator_error(OrchestratorError::StartFailure {
                quest_id: "q".into(),
                source: ExecutorError::Timeout,
            })
            .0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            orchestrator_error(OrchestratorError::Preferences(PreferenceError::OutOfRange(
                "speed_multiplier must be at least 1".into()
            )))
            .0,
            StatusCode::BAD_REQUEST
        );
    }
}
