//! Reconstruction of a lost executable binding.

use tracing::{info, warn};

use crate::executor::QuestGateway;
use crate::quest::QuestSnapshot;

use super::types::OrchestratorError;

/// Resolve the stand-in executable name for an application.
///
/// Used both when starting a simulated game and when recovering a binding
/// during teardown.
pub async fn resolve_executable(
    gateway: &dyn QuestGateway,
    app_id: &str,
    os: &str,
) -> Result<(String, String), OrchestratorError> {
    let catalog = gateway
        .list_detectable_applications()
        .await
        .map_err(OrchestratorError::Gateway)?;

    let app = catalog
        .iter()
        .find(|a| a.id == app_id)
        .ok_or_else(|| {
            OrchestratorError::CatalogMiss(format!(
                "application {} is not in the detectable catalog",
                app_id
            ))
        })?;

    let exe = app.executable_for(os).ok_or_else(|| {
        OrchestratorError::CatalogMiss(format!("no {} executable for {}", os, app.name))
    })?;

    Ok((app.name.clone(), exe.name.clone()))
}

/// Best-effort recovery of the executable bound to `quest_id`.
///
/// Returns `None` (after logging) when the quest, its application, or a
/// matching catalog entry cannot be found. Never fails.
pub async fn recover_executable(
    gateway: &dyn QuestGateway,
    quests: &QuestSnapshot,
    quest_id: &str,
    os: &str,
) -> Option<String> {
    let Some(app_id) = quests.find(quest_id).and_then(|q| q.application_id()) else {
        warn!(
            "Cannot recover executable for quest {}: no application id known",
            quest_id
        );
        return None;
    };

    match resolve_executable(gateway, app_id, os).await {
        Ok((_, exe)) => {
            info!("Recovered executable {} for quest {}", exe, quest_id);
            Some(exe)
        }
        Err(e) => {
            warn!("Executable recovery for quest {} missed: {}", quest_id, e);
            None
        }
    }
}
