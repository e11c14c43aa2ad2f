//! Preference handlers.

use axum::{extract::State, Json};
use questline_core::{GameQuestMode, Preferences};
use serde::Deserialize;
use std::sync::Arc;

use super::handlers::{orchestrator_error, ApiError};
use crate::state::AppState;

/// Partial update; omitted fields keep their current value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePreferencesBody {
    pub speed_multiplier: Option<u32>,
    pub heartbeat_interval_secs: Option<u64>,
    pub polling_interval_secs: Option<u64>,
    pub game_mode: Option<GameQuestMode>,
}

impl UpdatePreferencesBody {
    fn apply(self, mut preferences: Preferences) -> Preferences {
        if let Some(speed) = self.speed_multiplier {
            preferences.speed_multiplier = speed;
        }
        if let Some(secs) = self.heartbeat_interval_secs {
            preferences.heartbeat_interval_secs = secs;
        }
        if let Some(secs) = self.polling_interval_secs {
            preferences.polling_interval_secs = secs;
        }
        if let Some(mode) = self.game_mode {
            preferences.game_mode = mode;
        }
        preferences
    }
}

pub async fn get_preferences(State(state): State<Arc<AppState>>) -> Json<Preferences> {
    Json(state.orchestrator().preferences().await)
}

/// Validate, persist and apply a preference change
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdatePreferencesBody>,
) -> Result<Json<Preferences>, ApiError> {
    let orchestrator = state.orchestrator();
    let updated = body.apply(orchestrator.preferences().await);
    orchestrator
        .update_preferences(updated)
        .await
        .map_err(orchestrator_error)?;
    Ok(Json(orchestrator.preferences().await))
}
