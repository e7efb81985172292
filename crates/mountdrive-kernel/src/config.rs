//! Volume settings for the in-memory backend.
//!
//! Loaded from TOML. Every key is optional and unknown keys are rejected:
//!
//! ```toml
//! volume_label = "scratch"
//! volume_size_mb = 512
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Error type for config operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Settings for a [`MemoryStorage`](crate::MemoryStorage) volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryStorageConfig {
    /// Label shown for the mounted volume.
    pub volume_label: String,
    /// Total space in decimal megabytes.
    pub volume_size_mb: u64,
    pub max_component_length: u32,
    pub file_system_name: String,
}

impl Default for MemoryStorageConfig {
    fn default() -> Self {
        Self {
            volume_label: "memStorage".to_string(),
            volume_size_mb: 5000,
            max_component_length: 255,
            file_system_name: "MemoryStorage".to_string(),
        }
    }
}

impl MemoryStorageConfig {
    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse TOML text, filling missing keys with defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.volume_size_mb == 0 {
            return Err(ConfigError::ValidationFailed(
                "volume_size_mb must be positive".into(),
            ));
        }
        if self.max_component_length == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_component_length must be positive".into(),
            ));
        }
        Ok(())
    }
}
