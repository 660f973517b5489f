//! Server configuration
//!
//! A single YAML file. Every key is optional; a missing file means all
//! defaults.
//!
//! ```yaml
//! bind: 0.0.0.0:8123
//! websocket_path: /api/websocket
//! log_level: info
//! title: gRPC Bridge Companion
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use bridge_api::DEFAULT_WEBSOCKET_PATH;
use bridge_core::consts::NAME;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "GRPC_BRIDGE_CONFIG";

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP server listens on
    pub bind: String,
    pub websocket_path: String,
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: String,
    /// Title of the integration's config entry
    pub title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8123".to_string(),
            websocket_path: DEFAULT_WEBSOCKET_PATH.to_string(),
            log_level: "info".to_string(),
            title: NAME.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from `path`; no path, or a path that does not exist, yields the
    /// defaults
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            info!("Configuration file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        debug!("Loading configuration from {:?}", path);
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> ConfigResult<Self> {
        // An empty file parses as null
        let config: Option<Self> =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
                path: path.to_path_buf(),
                source: e,
            })?;
        let config = config.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        self.bind_addr()?;
        if !self.websocket_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                key: "websocket_path".to_string(),
                reason: "must start with '/'".to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> ConfigResult<SocketAddr> {
        self.bind.parse().map_err(|e| ConfigError::InvalidValue {
            key: "bind".to_string(),
            reason: format!("{e}"),
        })
    }
}

/// Pick the configuration file: the command-line argument, else
/// [`CONFIG_ENV`]
pub fn config_path(arg: Option<String>) -> Option<PathBuf> {
    arg.map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
}
