//! Configuration file support for cxl-fabricmgrd
//!
//! Loads the daemon configuration from a TOML file.
//! Default location: /etc/cxl-fabricmgrd/fabricmgrd.toml
//!
//! ```toml
//! [service]
//! service_type = "http"
//! service_host = "localhost"
//! service_port = 5555
//! service_root = "/redfish/v1"
//! timeout = 1.0
//!
//! [logging]
//! level = "debug"
//! ```

use crate::config::ServiceConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::Level;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cxl-fabricmgrd/fabricmgrd.toml";

/// Errors raised while loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Invalid log level '{0}'")]
    InvalidLogLevel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Maximum level: trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Complete cxl-fabricmgrd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Simulator connection settings, passed through unvalidated
    #[serde(default)]
    pub service: ServiceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Parses the configured level.
    pub fn max_level(&self) -> Result<Level, ConfigFileError> {
        self.level
            .parse::<Level>()
            .map_err(|_| ConfigFileError::InvalidLogLevel(self.level.clone()))
    }
}

impl DaemonConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigFileError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!(
                    "cxl-fabricmgrd: Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(ConfigFileError::Io(e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigFileError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}
