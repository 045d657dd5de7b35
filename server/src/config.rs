//! Configuration management for the server.

use scorm_engine::ScormVersion;
use std::env;

/// Largest request body accepted unless `MAX_BODY_BYTES` says otherwise.
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Version used for generated manifests when a request names none
    pub default_version: ScormVersion,
    /// Request body limit in bytes
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            default_version: ScormVersion::Scorm12,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);

        let port = match lookup("PORT") {
            Some(port) => port.parse().map_err(|_| ConfigError::InvalidPort)?,
            None => defaults.port,
        };

        let default_version = match lookup("SCORM_VERSION") {
            Some(version) => version
                .parse()
                .map_err(|_| ConfigError::InvalidVersion(version))?,
            None => defaults.default_version,
        };

        let max_body_bytes = match lookup("MAX_BODY_BYTES") {
            Some(bytes) => bytes.parse().map_err(|_| ConfigError::InvalidBodyLimit)?,
            None => defaults.max_body_bytes,
        };

        Ok(Self {
            host,
            port,
            default_version,
            max_body_bytes,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Unsupported SCORM_VERSION: {0} (expected 1.2 or 2004)")]
    InvalidVersion(String),

    #[error("Invalid MAX_BODY_BYTES value")]
    InvalidBodyLimit,
}
