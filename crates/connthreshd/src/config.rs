//! Daemon configuration.
//!
//! Loaded from a YAML file, or JSON when the file name ends in `.json`:
//!
//! ```yaml
//! orch:
//!   propagate_delete_rearm_errors: false
//! default_thresholds:
//!   - { metric: bytes, direction: orig, value: 1048576 }
//!   - { metric: packets, direction: resp, value: 100 }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use conn_thresholds::{Direction, Metric, ThresholdOrchConfig};

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        /// The file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The file is not valid YAML/JSON for this schema.
    #[error("Failed to parse config file {path:?}: {message}")]
    Parse {
        /// The file path.
        path: PathBuf,
        /// Parser error message.
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    Invalid {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid configuration error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A threshold installed on every new connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultThreshold {
    pub metric: Metric,
    pub direction: Direction,
    pub value: u64,
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Orchestrator settings.
    pub orch: ThresholdOrchConfig,
    /// Thresholds registered when a connection is first seen.
    pub default_thresholds: Vec<DefaultThreshold>,
}

impl DaemonConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
        .map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        config.validate()?;
        Ok(config)
    }

    fn from_yaml(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }

    fn from_json(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| e.to_string())
    }

    /// Checks that every default threshold can be registered.
    pub fn validate(&self) -> ConfigResult<()> {
        for (i, threshold) in self.default_thresholds.iter().enumerate() {
            if threshold.value == 0 {
                return Err(ConfigError::invalid(
                    format!("default_thresholds[{}].value", i),
                    "threshold must be positive",
                ));
            }
        }
        Ok(())
    }
}
