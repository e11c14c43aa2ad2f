//! Types for persisted preferences.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the preference store.
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("database error: {0}")]
    Database(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("{0}")]
    OutOfRange(String),
}

/// How "play" quests are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameQuestMode {
    /// Materialize and launch a stand-in executable plus a presence connection.
    #[default]
    Simulate,
    /// Ask the backend to send heartbeats directly; no local process.
    Heartbeat,
}

impl GameQuestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameQuestMode::Simulate => "simulate",
            GameQuestMode::Heartbeat => "heartbeat",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "simulate" => Some(GameQuestMode::Simulate),
            "heartbeat" => Some(GameQuestMode::Heartbeat),
            _ => None,
        }
    }
}

/// User-tunable settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Video playback speed multiplier.
    #[serde(default = "default_speed")]
    pub speed_multiplier: u32,

    /// Seconds between video progress heartbeats sent by the backend.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Seconds between authoritative status polls.
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,

    #[serde(default)]
    pub game_mode: GameQuestMode,
}

fn default_speed() -> u32 {
    7
}

fn default_heartbeat_interval() -> u64 {
    3
}

fn default_polling_interval() -> u64 {
    60
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            speed_multiplier: default_speed(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            polling_interval_secs: default_polling_interval(),
            game_mode: GameQuestMode::default(),
        }
    }
}

impl Preferences {
    pub fn validate(&self) -> Result<(), PreferenceError> {
        if self.speed_multiplier == 0 {
            return Err(PreferenceError::OutOfRange(
                "speed_multiplier must be at least 1".to_string(),
            ));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(PreferenceError::OutOfRange(
                "heartbeat_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.polling_interval_secs == 0 {
            return Err(PreferenceError::OutOfRange(
                "polling_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
