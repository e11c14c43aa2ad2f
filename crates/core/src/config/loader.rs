use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment prefix for overrides.
pub const ENV_PREFIX: &str = "QUESTLINE_";

/// Separator between nested keys in override names. Keys themselves contain
/// single underscores (`timeout_secs`), so sections are split on a double one:
/// `QUESTLINE_EXECUTOR__TIMEOUT_SECS` sets `executor.timeout_secs`.
const ENV_SEPARATOR: &str = "__";

fn figment(base: Figment) -> Figment {
    base.merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR))
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    figment(Figment::new().merge(Toml::file(path)))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string, without environment overrides
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
