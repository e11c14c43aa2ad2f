//! Quest data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::NamedCounters;

/// A quest and the user's authoritative status on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub config: QuestConfig,
    #[serde(default)]
    pub user_status: Option<UserStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestConfig {
    #[serde(default)]
    pub messages: QuestMessages,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewards_config: Option<RewardsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_duration_requirement_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_config: Option<TaskConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_config_v2: Option<TaskConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<QuestApplication>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestMessages {
    #[serde(default)]
    pub quest_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardsConfig {
    #[serde(default)]
    pub rewards: Vec<Reward>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    #[serde(default)]
    pub messages: RewardMessages,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardMessages {
    #[serde(default)]
    pub name: String,
}

/// Named tasks and their duration targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub tasks: NamedCounters<TaskTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
}

/// The external application a play quest is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestApplication {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub link: String,
}

/// Authoritative per-user status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStatus {
    #[serde(default)]
    pub progress: NamedCounters<ProgressCounter>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub enrolled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressCounter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// What a quest asks the user to do, derived from its first task name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestTaskType {
    Video,
    Stream,
    Play,
    Unknown,
}

impl QuestTaskType {
    /// Classify a task name such as `WATCH_VIDEO` or `PLAY_ON_DESKTOP`.
    pub fn from_task_name(name: &str) -> Self {
        let name = name.to_ascii_uppercase();
        if name.contains("VIDEO") {
            QuestTaskType::Video
        } else if name.contains("STREAM") {
            QuestTaskType::Stream
        } else if name.contains("PLAY") {
            QuestTaskType::Play
        } else {
            QuestTaskType::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestTaskType::Video => "video",
            QuestTaskType::Stream => "stream",
            QuestTaskType::Play => "play",
            QuestTaskType::Unknown => "unknown",
        }
    }
}

impl Quest {
    /// The task config in effect: `task_config`, else `task_config_v2`.
    fn tasks(&self) -> Option<&TaskConfig> {
        self.config
            .task_config
            .as_ref()
            .or(self.config.task_config_v2.as_ref())
    }

    /// Seconds required for completion, from the first task's target.
    pub fn target_seconds(&self) -> f64 {
        self.tasks()
            .and_then(|tc| tc.tasks.first())
            .and_then(|(_, t)| t.target)
            .unwrap_or(0.0)
    }

    /// Value of the first progress counter, if the status carries one.
    /// The first counter wins when several exist.
    pub fn first_progress_value(&self) -> Option<f64> {
        self.user_status
            .as_ref()
            .and_then(|s| s.progress.first())
            .and_then(|(_, c)| c.value)
    }

    /// Seconds already credited.
    pub fn progress_seconds(&self) -> f64 {
        self.first_progress_value().unwrap_or(0.0)
    }

    pub fn is_completed(&self) -> bool {
        self.user_status
            .as_ref()
            .is_some_and(|s| s.completed_at.is_some())
    }

    pub fn is_enrolled(&self) -> bool {
        self.user_status
            .as_ref()
            .is_some_and(|s| s.enrolled_at.is_some())
    }

    pub fn task_type(&self) -> QuestTaskType {
        self.tasks()
            .and_then(|tc| tc.tasks.first())
            .map(|(name, _)| QuestTaskType::from_task_name(name))
            .unwrap_or(QuestTaskType::Unknown)
    }

    pub fn application_id(&self) -> Option<&str> {
        self.config
            .application
            .as_ref()
            .map(|a| a.id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn name(&self) -> &str {
        &self.config.messages.quest_name
    }
}
