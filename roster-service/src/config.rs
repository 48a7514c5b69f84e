use serde::Deserialize;
use thiserror::Error;

/// Service-level knobs. Everything has a default, so the service also runs
/// without a config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Solver budget in seconds when neither the request nor the query
    /// parameter specifies one.
    #[serde(default = "default_time_limit_sec")]
    pub default_time_limit_sec: u64,
}

fn default_time_limit_sec() -> u64 {
    60
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_time_limit_sec: default_time_limit_sec(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ServiceConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides_from_toml() {
        let config: ServiceConfig = toml::from_str("default_time_limit_sec = 120").unwrap();
        assert_eq!(config.default_time_limit_sec, 120);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: ServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config.default_time_limit_sec, 60);
    }
}
