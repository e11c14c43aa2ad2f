//! Types and traits for the executor boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quest::Quest;

/// Errors reported by the gateway or executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Rejected by executor: {0}")]
    Rejected(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout")]
    Timeout,
}

/// An application the platform can detect as running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectableApplication {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub executables: Vec<ApplicationExecutable>,
}

/// One executable descriptor of a detectable application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationExecutable {
    pub name: String,
    pub os: String,
}

impl DetectableApplication {
    /// First executable declared for the given platform tag (e.g. `win32`).
    pub fn executable_for(&self, os: &str) -> Option<&ApplicationExecutable> {
        self.executables.iter().find(|e| e.os == os)
    }
}

/// Authoritative quest status and lookups.
#[async_trait]
pub trait QuestGateway: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Current quest list with user status.
    async fn list_quests(&self) -> Result<Vec<Quest>, ExecutorError>;

    /// Catalog of applications the platform can detect.
    async fn list_detectable_applications(
        &self,
    ) -> Result<Vec<DetectableApplication>, ExecutorError>;

    /// Enroll the user in a quest.
    async fn enroll_in_task(&self, quest_id: &str) -> Result<(), ExecutorError>;
}

/// Starts and stops quest work.
///
/// Progress values are percentages (0-100); durations are seconds.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn start_duration_task(
        &self,
        quest_id: &str,
        target_seconds: f64,
        initial_progress_pct: f64,
        speed_multiplier: u32,
        heartbeat_interval_secs: u64,
    ) -> Result<(), ExecutorError>;

    async fn start_stream_task(
        &self,
        quest_id: &str,
        stream_key: &str,
        target_seconds: f64,
        initial_progress_pct: f64,
    ) -> Result<(), ExecutorError>;

    async fn start_process_heartbeat_task(
        &self,
        quest_id: &str,
        app_id: &str,
        target_seconds: f64,
        initial_progress_pct: f64,
    ) -> Result<(), ExecutorError>;

    /// Stop whatever is running. Fails benignly when nothing is.
    async fn stop_task(&self) -> Result<(), ExecutorError>;

    /// Flush a final elapsed-seconds value for a duration task.
    async fn force_submit_progress(
        &self,
        quest_id: &str,
        elapsed_seconds: f64,
    ) -> Result<(), ExecutorError>;

    async fn create_fake_executable(
        &self,
        install_path: &str,
        executable_name: &str,
        app_id: &str,
    ) -> Result<(), ExecutorError>;

    async fn launch_fake_executable(
        &self,
        name: &str,
        install_path: &str,
        executable_name: &str,
        app_id: &str,
    ) -> Result<(), ExecutorError>;

    async fn terminate_fake_executable(&self, executable_name: &str) -> Result<(), ExecutorError>;

    async fn open_activity_presence(
        &self,
        activity_json: &str,
        action: &str,
    ) -> Result<(), ExecutorError>;

    /// Tear down the activity-presence channel.
    async fn emit_disconnect(&self) -> Result<(), ExecutorError>;
}
