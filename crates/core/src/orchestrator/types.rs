//! Types for the quest orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::executor::ExecutorError;
use crate::preferences::PreferenceError;

/// Errors that can occur during orchestration.
///
/// Only failures while starting (or from plain requests) are surfaced;
/// teardown failures are logged and swallowed.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The executor rejected or failed a start request.
    #[error("failed to start quest {quest_id}: {source}")]
    StartFailure {
        quest_id: String,
        #[source]
        source: ExecutorError,
    },

    /// The application (or a platform executable for it) is not in the catalog.
    #[error("catalog miss: {0}")]
    CatalogMiss(String),

    /// A play quest without an application id.
    #[error("quest {0} has no application id")]
    MissingApplication(String),

    #[error("quest not found: {0}")]
    QuestNotFound(String),

    #[error("quest {quest_id} has unsupported task type {task_type}")]
    UnsupportedTask { quest_id: String, task_type: String },

    /// A start or stop is still in flight.
    #[error("another session is starting or stopping")]
    SessionBusy,

    /// Another queue already owns the session.
    #[error("{0} queue is already running")]
    QueueBusy(QueueKind),

    #[error("gateway error: {0}")]
    Gateway(#[from] ExecutorError),

    #[error("preference error: {0}")]
    Preferences(#[from] PreferenceError),
}

/// The four session kinds, each with its own start path and signaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestKind {
    Video,
    Stream,
    GameSimulated,
    GameHeartbeat,
}

impl QuestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestKind::Video => "video",
            QuestKind::Stream => "stream",
            QuestKind::GameSimulated => "game_simulated",
            QuestKind::GameHeartbeat => "game_heartbeat",
        }
    }

    /// Kinds without reliable pushed completion get the status poller.
    pub fn needs_polling(&self) -> bool {
        !matches!(self, QuestKind::Video)
    }

    /// Kinds that run a local stand-in process.
    pub fn is_process_backed(&self) -> bool {
        matches!(self, QuestKind::GameSimulated)
    }
}

/// Lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Starting,
    Active,
    Stopping,
}

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The user asked to stop.
    UserRequested,
    /// The executor pushed a completion signal.
    Completed,
    /// The poller saw a completion timestamp.
    AutoDetected,
    /// The executor pushed an error signal.
    ExecutorError,
    /// A new start replaced the session.
    Superseded,
    /// A queue was cleared.
    QueueCleared,
    /// The process is shutting down.
    Shutdown,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::UserRequested => "user_requested",
            StopReason::Completed => "completed",
            StopReason::AutoDetected => "auto_detected",
            StopReason::ExecutorError => "executor_error",
            StopReason::Superseded => "superseded",
            StopReason::QueueCleared => "queue_cleared",
            StopReason::Shutdown => "shutdown",
        }
    }

    /// Whether accumulated video progress is flushed before teardown.
    /// Completion needs no flush; after an error the progress is not trusted.
    pub fn submits_progress(&self) -> bool {
        !matches!(
            self,
            StopReason::Completed | StopReason::AutoDetected | StopReason::ExecutorError
        )
    }

    /// Whether the queue that owned the session moves on to its next item.
    pub fn advances_queue(&self) -> bool {
        matches!(
            self,
            StopReason::Completed | StopReason::AutoDetected | StopReason::ExecutorError
        )
    }
}

/// The two batch queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    Video,
    Play,
}

impl QueueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Video => "video",
            QueueKind::Play => "play",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(QueueKind::Video),
            "play" => Some(QueueKind::Play),
            _ => None,
        }
    }
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStatus {
    pub running: bool,
    pub quest_ids: Vec<String>,
}

/// Snapshot of the whole orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub quest_id: Option<String>,
    pub kind: Option<QuestKind>,
    pub authoritative_progress_pct: f64,
    pub local_progress_pct: f64,
    pub target_seconds: f64,
    pub bound_executable: Option<String>,
    /// A non-silent quest refresh is in flight.
    pub loading: bool,
    pub stopping: bool,
    pub last_error: Option<String>,
    pub video_queue: QueueStatus,
    pub play_queue: QueueStatus,
}

/// Outcome of a bulk enrollment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Change notifications broadcast to observers (UI, WebSocket).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    SessionStarted {
        quest_id: String,
        kind: QuestKind,
        progress_pct: f64,
    },
    SessionProgress {
        quest_id: String,
        authoritative_pct: f64,
        local_pct: f64,
    },
    SessionStopped {
        quest_id: String,
        reason: StopReason,
    },
    QueueChanged {
        queue: QueueKind,
        running: bool,
        length: usize,
    },
    QuestsRefreshed {
        count: usize,
    },
}
