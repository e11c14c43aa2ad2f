//! Mock task executor for testing.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::executor::{ExecutorError, TaskExecutor};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// A recorded executor call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorCall {
    StartDuration {
        quest_id: String,
        target_seconds: f64,
        initial_progress_pct: f64,
        speed_multiplier: u32,
        heartbeat_interval_secs: u64,
    },
    StartStream {
        quest_id: String,
        stream_key: String,
        target_seconds: f64,
        initial_progress_pct: f64,
    },
    StartHeartbeat {
        quest_id: String,
        app_id: String,
        target_seconds: f64,
        initial_progress_pct: f64,
    },
    StopTask,
    ForceSubmit {
        quest_id: String,
        elapsed_seconds: f64,
    },
    CreateExecutable {
        install_path: String,
        executable_name: String,
        app_id: String,
    },
    LaunchExecutable {
        name: String,
        install_path: String,
        executable_name: String,
        app_id: String,
    },
    TerminateExecutable {
        executable_name: String,
    },
    OpenPresence {
        activity_json: String,
        action: String,
    },
    EmitDisconnect,
}

impl ExecutorCall {
    /// The executor operation this call hit.
    pub fn name(&self) -> &'static str {
        match self {
            ExecutorCall::StartDuration { .. } => "start_duration_task",
            ExecutorCall::StartStream { .. } => "start_stream_task",
            ExecutorCall::StartHeartbeat { .. } => "start_process_heartbeat_task",
            ExecutorCall::StopTask => "stop_task",
            ExecutorCall::ForceSubmit { .. } => "force_submit_progress",
            ExecutorCall::CreateExecutable { .. } => "create_fake_executable",
            ExecutorCall::LaunchExecutable { .. } => "launch_fake_executable",
            ExecutorCall::TerminateExecutable { .. } => "terminate_fake_executable",
            ExecutorCall::OpenPresence { .. } => "open_activity_presence",
            ExecutorCall::EmitDisconnect => "emit_disconnect",
        }
    }
}

/// Mock implementation of the TaskExecutor trait.
///
/// Every call is recorded in order, including calls that were made to fail.
///
/// # Example
///
/// ```rust,ignore
/// let executor = MockExecutor::new();
/// executor.fail_on("stop_task", "no quest running");
///
/// // ... drive the orchestrator ...
///
/// assert_eq!(executor.call_names(), vec!["start_duration_task", "stop_task"]);
/// ```
#[derive(Debug, Default)]
pub struct MockExecutor {
    calls: Mutex<Vec<ExecutorCall>>,
    /// If set, the next operation will fail with this error.
    next_error: Mutex<Option<ExecutorError>>,
    /// Operations that always fail, by name, with a rejection message.
    failing: Mutex<HashMap<&'static str, String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<ExecutorCall> {
        lock(&self.calls).clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        lock(&self.calls).iter().map(ExecutorCall::name).collect()
    }

    pub fn count(&self, predicate: impl Fn(&ExecutorCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| predicate(c)).count()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    pub fn fail_next(&self, error: ExecutorError) {
        *lock(&self.next_error) = Some(error);
    }

    /// Make every call to `operation` fail with `ExecutorError::Rejected`.
    pub fn fail_on(&self, operation: &'static str, message: &str) {
        lock(&self.failing).insert(operation, message.to_string());
    }

    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
        lock(&self.next_error).take();
    }

    fn record(&self, call: ExecutorCall) -> Result<(), ExecutorError> {
        let name = call.name();
        lock(&self.calls).push(call);

        if let Some(e) = lock(&self.next_error).take() {
            return Err(e);
        }
        match lock(&self.failing).get(name) {
            Some(message) => Err(ExecutorError::Rejected(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TaskExecutor for MockExecutor {
    async fn start_duration_task(
        &self,
        quest_id: &str,
        target_seconds: f64,
        initial_progress_pct: f64,
        speed_multiplier: u32,
        heartbeat_interval_secs: u64,
    ) -> Result<(), ExecutorError> {
        self.record(ExecutorCall::StartDuration {
            quest_id: quest_id.to_string(),
            target_seconds,
            initial_progress_pct,
            speed_multiplier,
            heartbeat_interval_secs,
        })
    }

    async fn start_stream_task(
        &self,
        quest_id: &str,
        stream_key: &str,
        target_seconds: f64,
        initial_progress_pct: f64,
    ) -> Result<(), ExecutorError> {
        self.record(ExecutorCall::StartStream {
            quest_id: quest_id.to_string(),
            stream_key: stream_key.to_string(),
            target_seconds,
            initial_progress_pct,
        })
    }

    async fn start_process_heartbeat_task(
        &self,
        quest_id: &str,
        app_id: &str,
        target_seconds: f64,
        initial_progress_pct: f64,
    ) -> Result<(), ExecutorError> {
        self.record(ExecutorCall::StartHeartbeat {
            quest_id: quest_id.to_string(),
            app_id: app_id.to_string(),
            target_seconds,
            initial_progress_pct,
        })
    }

    async fn stop_task(&self) -> Result<(), ExecutorError> {
        self.record(ExecutorCall::StopTask)
    }

    async fn force_submit_progress(
        &self,
        quest_id: &str,
        elapsed_seconds: f64,
    ) -> Result<(), ExecutorError> {
        self.record(ExecutorCall::ForceSubmit {
            quest_id: quest_id.to_string(),
            elapsed_seconds,
        })
    }

    async fn create_fake_executable(
        &self,
        install_path: &str,
        executable_name: &str,
        app_id: &str,
    ) -> Result<(), ExecutorError> {
        self.record(ExecutorCall::CreateExecutable {
            install_path: install_path.to_string(),
            executable_name: executable_name.to_string(),
            app_id: app_id.to_string(),
        })
    }

    async fn launch_fake_executable(
        &self,
        name: &str,
        install_path: &str,
        executable_name: &str,
        app_id: &str,
    ) -> Result<(), ExecutorError> {
        self.record(ExecutorCall::LaunchExecutable {
            name: name.to_string(),
            install_path: install_path.to_string(),
            executable_name: executable_name.to_string(),
            app_id: app_id.to_string(),
        })
    }

    async fn terminate_fake_executable(&self, executable_name: &str) -> Result<(), ExecutorError> {
        self.record(ExecutorCall::TerminateExecutable {
            executable_name: executable_name.to_string(),
        })
    }

    async fn open_activity_presence(
        &self,
        activity_json: &str,
        action: &str,
    ) -> Result<(), ExecutorError> {
        self.record(ExecutorCall::OpenPresence {
            activity_json: activity_json.to_string(),
            action: action.to_string(),
        })
    }

    async fn emit_disconnect(&self) -> Result<(), ExecutorError> {
        self.record(ExecutorCall::EmitDisconnect)
    }
}
