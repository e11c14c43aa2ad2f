//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the gateway and executor
//! traits, allowing orchestrator and server tests without a real backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use questline_core::testing::{fixtures, MockExecutor, MockGateway};
//!
//! let gateway = MockGateway::new()
//!     .with_quests(vec![fixtures::video_quest("v1", 600.0, 150.0)]);
//! let executor = MockExecutor::new();
//!
//! // ... build a QuestOrchestrator, drive it ...
//!
//! assert_eq!(executor.call_names(), vec!["start_duration_task"]);
//! ```

mod mock_executor;
mod mock_gateway;

pub use mock_executor::{ExecutorCall, MockExecutor};
pub use mock_gateway::MockGateway;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, Utc};

    use crate::executor::{ApplicationExecutable, DetectableApplication};
    use crate::quest::{
        NamedCounters, ProgressCounter, Quest, QuestApplication, QuestConfig, QuestMessages,
        TaskConfig, TaskTarget, UserStatus,
    };

    const ENROLLED_AT: i64 = 1_767_268_800; // 2026-01-01T12:00:00Z
    const COMPLETED_AT: i64 = 1_767_355_200; // 2026-01-02T12:00:00Z

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap_or_default()
    }

    fn quest(id: &str, task: &str, target_seconds: f64, progress_seconds: f64) -> Quest {
        let mut tasks = NamedCounters::new();
        tasks.insert(
            task,
            TaskTarget {
                target: Some(target_seconds),
            },
        );
        let mut progress = NamedCounters::new();
        progress.insert(
            task,
            ProgressCounter {
                value: Some(progress_seconds),
            },
        );

        Quest {
            id: id.to_string(),
            config: QuestConfig {
                messages: QuestMessages {
                    quest_name: format!("Quest {}", id),
                    game_title: None,
                },
                task_config: Some(TaskConfig { tasks }),
                ..QuestConfig::default()
            },
            user_status: Some(UserStatus {
                progress,
                enrolled_at: Some(at(ENROLLED_AT)),
                ..UserStatus::default()
            }),
        }
    }

    /// An enrolled video quest.
    pub fn video_quest(id: &str, target_seconds: f64, progress_seconds: f64) -> Quest {
        quest(id, "WATCH_VIDEO", target_seconds, progress_seconds)
    }

    /// An enrolled stream quest.
    pub fn stream_quest(id: &str, target_seconds: f64, progress_seconds: f64) -> Quest {
        quest(id, "STREAM_ON_DESKTOP", target_seconds, progress_seconds)
    }

    /// An enrolled play quest bound to application `app_id`.
    pub fn play_quest(id: &str, app_id: &str, target_seconds: f64, progress_seconds: f64) -> Quest {
        let mut quest = quest(id, "PLAY_ON_DESKTOP", target_seconds, progress_seconds);
        quest.config.application = Some(QuestApplication {
            id: app_id.to_string(),
            name: format!("Game {}", app_id),
            link: String::new(),
        });
        quest
    }

    /// The same quest with a completion timestamp.
    pub fn completed(mut quest: Quest) -> Quest {
        let status = quest.user_status.get_or_insert_with(UserStatus::default);
        status.completed_at = Some(at(COMPLETED_AT));
        quest
    }

    /// The same quest without an enrollment timestamp.
    pub fn unenrolled(mut quest: Quest) -> Quest {
        if let Some(status) = quest.user_status.as_mut() {
            status.enrolled_at = None;
        }
        quest
    }

    /// The same quest with its first progress counter set to `seconds`.
    pub fn with_progress(mut quest: Quest, seconds: f64) -> Quest {
        let status = quest.user_status.get_or_insert_with(UserStatus::default);
        let name = status
            .progress
            .first()
            .map(|(name, _)| name.to_string())
            .unwrap_or_else(|| "PROGRESS".to_string());
        status.progress.insert(
            name,
            ProgressCounter {
                value: Some(seconds),
            },
        );
        quest
    }

    /// A detectable application with a win32 and a linux executable.
    pub fn detectable_app(id: &str, name: &str, win32_executable: &str) -> DetectableApplication {
        DetectableApplication {
            id: id.to_string(),
            name: name.to_string(),
            executables: vec![
                ApplicationExecutable {
                    name: format!("{}-linux", name.to_lowercase().replace(' ', "-")),
                    os: "linux".to_string(),
                },
                ApplicationExecutable {
                    name: win32_executable.to_string(),
                    os: "win32".to_string(),
                },
            ],
        }
    }
}
