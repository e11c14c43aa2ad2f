//! Orchestrator configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the quest orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How often the progress simulator advances local progress (milliseconds).
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Pause between a queue item finishing and the next one starting
    /// (milliseconds). Gives the backend time to register the transition.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Pause between consecutive enrollments in a bulk enroll (milliseconds).
    #[serde(default = "default_enroll_delay")]
    pub enroll_delay_ms: u64,

    /// Where stand-in executables are materialized.
    /// Defaults to `Documents/DiscordQuestGames` under the home directory.
    #[serde(default)]
    pub install_dir: Option<PathBuf>,

    /// Platform tag matched against the application catalog.
    #[serde(default = "default_executable_os")]
    pub executable_os: String,
}

fn default_tick_interval() -> u64 {
    250
}

fn default_settle_delay() -> u64 {
    2000
}

fn default_enroll_delay() -> u64 {
    500
}

fn default_executable_os() -> String {
    "win32".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            settle_delay_ms: default_settle_delay(),
            enroll_delay_ms: default_enroll_delay(),
            install_dir: None,
            executable_os: default_executable_os(),
        }
    }
}

impl OrchestratorConfig {
    /// The install directory, resolving the home-relative default.
    pub fn resolved_install_dir(&self) -> PathBuf {
        if let Some(dir) = &self.install_dir {
            return dir.clone();
        }
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        home.join("Documents").join("DiscordQuestGames")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.tick_interval_ms, 250);
        assert_eq!(config.settle_delay_ms, 2000);
        assert_eq!(config.enroll_delay_ms, 500);
        assert_eq!(config.executable_os, "win32");
        assert!(config.install_dir.is_none());
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            tick_interval_ms = 100
            settle_delay_ms = 10
            enroll_delay_ms = 0
            install_dir = "/opt/quest-games"
            executable_os = "linux"
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.tick_interval_ms, 100);
        assert_eq!(config.settle_delay_ms, 10);
        assert_eq!(config.enroll_delay_ms, 0);
        assert_eq!(config.executable_os, "linux");
        assert_eq!(config.resolved_install_dir(), PathBuf::from("/opt/quest-games"));
    }

    #[test]
    fn test_default_install_dir_ends_with_games_folder() {
        let dir = OrchestratorConfig::default().resolved_install_dir();
        assert!(dir.ends_with("Documents/DiscordQuestGames"));
    }
}
