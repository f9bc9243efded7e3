use std::path::Path;
use thiserror::Error;

use super::types::StreamConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load client configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<StreamConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string; missing keys take their defaults
pub fn load_config_from_str(json: &str) -> Result<StreamConfig, ConfigError> {
    let config: StreamConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<StreamConfig, ConfigError> {
    let default_config = include_str!("stream_config.json");
    load_config_from_str(default_config)
}

impl StreamConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = [
            ("address", &self.address),
            ("hub_name", &self.hub_name),
            ("feed_action", &self.feed_action),
            ("feed_event", &self.feed_event),
        ];
        if let Some((field, _)) = names.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("{} must not be empty", field)));
        }
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "backoff_multiplier must be at least 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }
}
