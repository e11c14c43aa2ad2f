//! HTTP client for the executor bridge.
//!
//! The bridge exposes each backend command as `POST {url}/invoke/{command}`
//! taking a JSON object of arguments. A 2xx response carries the command's
//! JSON result (`null` for commands without one); anything else carries the
//! error message as the body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ExecutorConfig;
use crate::metrics;
use crate::quest::Quest;

use super::{DetectableApplication, ExecutorError, QuestGateway, TaskExecutor};

/// Executor bridge client implementing both the gateway and the executor.
pub struct HttpExecutorClient {
    client: Client,
    config: ExecutorConfig,
}

impl HttpExecutorClient {
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ExecutorError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn map_transport_error(e: reqwest::Error) -> ExecutorError {
        if e.is_timeout() {
            ExecutorError::Timeout
        } else if e.is_connect() {
            ExecutorError::ConnectionFailed(e.to_string())
        } else {
            ExecutorError::InvalidResponse(e.to_string())
        }
    }

    /// Invoke a command and return its raw JSON result.
    async fn invoke(&self, command: &str, args: Value) -> Result<Value, ExecutorError> {
        let timer = metrics::EXECUTOR_REQUEST_DURATION
            .with_label_values(&[command])
            .start_timer();
        let result = self.send(command, args).await;
        timer.observe_duration();

        let label = if result.is_ok() { "success" } else { "error" };
        metrics::EXECUTOR_REQUESTS
            .with_label_values(&[command, label])
            .inc();
        result
    }

    async fn send(&self, command: &str, args: Value) -> Result<Value, ExecutorError> {
        let url = format!("{}/invoke/{}", self.base_url(), command);
        debug!("Invoking executor command {}", command);

        let response = self
            .client
            .post(&url)
            .json(&args)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                format!("HTTP {}", status)
            } else {
                body.chars().take(200).collect()
            };
            return Err(ExecutorError::Rejected(message));
        }

        let body = response.text().await.map_err(Self::map_transport_error)?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ExecutorError::InvalidResponse(e.to_string()))
    }

    async fn invoke_as<T: DeserializeOwned>(
        &self,
        command: &str,
        args: Value,
    ) -> Result<T, ExecutorError> {
        let value = self.invoke(command, args).await?;
        serde_json::from_value(value).map_err(|e| ExecutorError::InvalidResponse(e.to_string()))
    }

    async fn invoke_unit(&self, command: &str, args: Value) -> Result<(), ExecutorError> {
        self.invoke(command, args).await.map(|_| ())
    }
}

#[async_trait]
impl QuestGateway for HttpExecutorClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn list_quests(&self) -> Result<Vec<Quest>, ExecutorError> {
        self.invoke_as("get_quests", json!({})).await
    }

    async fn list_detectable_applications(
        &self,
    ) -> Result<Vec<DetectableApplication>, ExecutorError> {
        self.invoke_as("fetch_detectable_games", json!({})).await
    }

    async fn enroll_in_task(&self, quest_id: &str) -> Result<(), ExecutorError> {
        self.invoke_unit("accept_quest", json!({ "questId": quest_id }))
            .await
    }
}

#[async_trait]
impl TaskExecutor for HttpExecutorClient {
    async fn start_duration_task(
        &self,
        quest_id: &str,
        target_seconds: f64,
        initial_progress_pct: f64,
        speed_multiplier: u32,
        heartbeat_interval_secs: u64,
    ) -> Result<(), ExecutorError> {
        self.invoke_unit(
            "start_video_quest",
            json!({
                "questId": quest_id,
                "secondsNeeded": target_seconds,
                "initialProgress": initial_progress_pct,
                "speedMultiplier": speed_multiplier,
                "heartbeatInterval": heartbeat_interval_secs,
            }),
        )
        .await
    }

    async fn start_stream_task(
        &self,
        quest_id: &str,
        stream_key: &str,
        target_seconds: f64,
        initial_progress_pct: f64,
    ) -> Result<(), ExecutorError> {
        self.invoke_unit(
            "start_stream_quest",
            json!({
                "questId": quest_id,
                "streamKey": stream_key,
                "secondsNeeded": target_seconds,
                "initialProgress": initial_progress_pct,
            }),
        )
        .await
    }

    async fn start_process_heartbeat_task(
        &self,
        quest_id: &str,
        app_id: &str,
        target_seconds: f64,
        initial_progress_pct: f64,
    ) -> Result<(), ExecutorError> {
        self.invoke_unit(
            "start_game_heartbeat_quest",
            json!({
                "questId": quest_id,
                "applicationId": app_id,
                "secondsNeeded": target_seconds,
                "initialProgress": initial_progress_pct,
            }),
        )
        .await
    }

    async fn stop_task(&self) -> Result<(), ExecutorError> {
        self.invoke_unit("stop_quest", json!({})).await
    }

    async fn force_submit_progress(
        &self,
        quest_id: &str,
        elapsed_seconds: f64,
    ) -> Result<(), ExecutorError> {
        self.invoke_unit(
            "force_video_progress",
            json!({ "questId": quest_id, "timestamp": elapsed_seconds }),
        )
        .await
    }

    async fn create_fake_executable(
        &self,
        install_path: &str,
        executable_name: &str,
        app_id: &str,
    ) -> Result<(), ExecutorError> {
        self.invoke_unit(
            "create_simulated_game",
            json!({ "path": install_path, "executableName": executable_name, "appId": app_id }),
        )
        .await
    }

    async fn launch_fake_executable(
        &self,
        name: &str,
        install_path: &str,
        executable_name: &str,
        app_id: &str,
    ) -> Result<(), ExecutorError> {
        self.invoke_unit(
            "run_simulated_game",
            json!({
                "name": name,
                "path": install_path,
                "executableName": executable_name,
                "appId": app_id,
            }),
        )
        .await
    }

    async fn terminate_fake_executable(&self, executable_name: &str) -> Result<(), ExecutorError> {
        self.invoke_unit("stop_simulated_game", json!({ "execName": executable_name }))
            .await
    }

    async fn open_activity_presence(
        &self,
        activity_json: &str,
        action: &str,
    ) -> Result<(), ExecutorError> {
        self.invoke_unit(
            "connect_to_discord_rpc",
            json!({ "activity_json": activity_json, "action": action }),
        )
        .await
    }

    async fn emit_disconnect(&self) -> Result<(), ExecutorError> {
        self.invoke_unit("event_disconnect", json!({})).await
    }
}
