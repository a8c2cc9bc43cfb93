//! Configuration file handling
//!
//! One JSON file, few knobs, serde defaults for everything so a bare `{}`
//! is a working configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where the CLI looks for configuration when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "./shaledb.json";

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors — all fatal to the command that hit them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Unreadable(String),

    #[error("Invalid config JSON: {0}")]
    Malformed(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for record-store domains (default: "./shale_db")
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Host to bind the socket server to (default: "127.0.0.1")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_data_dir() -> String {
    "./shale_db".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Unreadable(format!("{}: {}", path.display(), e)))?;

        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::Malformed(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".into()));
        }
        Ok(())
    }

    /// Get the data directory as a Path
    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    /// Get the socket address string for the server bind
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
