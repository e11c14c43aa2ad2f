use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::orchestrator::OrchestratorConfig;
use crate::preferences::Preferences;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Defaults used until the user changes a preference.
    #[serde(default)]
    pub preferences: Preferences,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration (persisted preferences live here)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("questline.db")
}

/// Executor bridge configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutorConfig {
    /// Base URL of the executor bridge (e.g., "http://127.0.0.1:7420")
    pub url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub executor: SanitizedExecutorConfig,
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedExecutorConfig {
    pub url: String,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            executor: SanitizedExecutorConfig {
                url: config.executor.url.clone(),
                timeout_secs: config.executor.timeout_secs,
            },
            orchestrator: config.orchestrator.clone(),
        }
    }
}
