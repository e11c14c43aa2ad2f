use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Executor URL is present
/// - Orchestrator tick interval is not 0
/// - Preference defaults are within range
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.executor.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "executor.url cannot be empty".to_string(),
        ));
    }

    if config.orchestrator.tick_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.tick_interval_ms cannot be 0".to_string(),
        ));
    }

    config
        .preferences
        .validate()
        .map_err(|e| ConfigError::ValidationError(format!("preferences: {}", e)))?;

    Ok(())
}
