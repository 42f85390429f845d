//! Harness settings shared by a whole test suite.
//!
//! Settings are plain data: timeouts, the engine binary and teardown log
//! flags. They load from a YAML file named by `CONTAINER_HARNESS_CONFIG`,
//! fall back to defaults otherwise, and seed [`crate::Options`] through
//! [`crate::Options::from_settings`].
//!
//! ```yaml
//! docker_binary: podman
//! timeout_secs: 120
//! pull_timeout_secs: 300
//! log_stderr: true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Environment variable naming a YAML settings file
pub const CONFIG_ENV: &str = "CONTAINER_HARNESS_CONFIG";

/// Environment variable overriding the engine binary
pub const DOCKER_ENV: &str = "CONTAINER_HARNESS_DOCKER";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        /// File that could not be read
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Suite-wide harness settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Engine CLI to invoke
    pub docker_binary: String,
    /// Scope for create, start, inspect and readiness (seconds)
    pub timeout_secs: u64,
    /// Scope for the image pull (seconds)
    pub pull_timeout_secs: u64,
    /// Bound on each readiness predicate invocation (seconds)
    pub ready_timeout_secs: u64,
    /// Scope for stop and remove (seconds)
    pub cleanup_timeout_secs: u64,
    /// Grace period given to the container on stop (seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_timeout_secs: Option<u64>,
    /// Log the container's stdout on teardown
    pub log_stdout: bool,
    /// Log the container's stderr on teardown
    pub log_stderr: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            docker_binary: "docker".to_string(),
            timeout_secs: 60,
            pull_timeout_secs: 60,
            ready_timeout_secs: 2,
            cleanup_timeout_secs: 15,
            stop_timeout_secs: None,
            log_stdout: false,
            log_stderr: false,
        }
    }
}

impl Settings {
    /// Parse settings from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Loaded harness settings from {}", path.display());
        Self::from_yaml_str(&yaml)
    }

    /// Load from `CONTAINER_HARNESS_CONFIG` if set, then apply `CONTAINER_HARNESS_DOCKER`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Ok(binary) = std::env::var(DOCKER_ENV) {
            if !binary.trim().is_empty() {
                settings.docker_binary = binary;
            }
        }
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.docker_binary.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "docker_binary must not be empty".to_string(),
            ));
        }
        for (name, value) in [
            ("timeout_secs", self.timeout_secs),
            ("pull_timeout_secs", self.pull_timeout_secs),
            ("ready_timeout_secs", self.ready_timeout_secs),
            ("cleanup_timeout_secs", self.cleanup_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Run-scope timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Pull-scope timeout
    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs)
    }

    /// Per-check readiness timeout
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    /// Cleanup-scope timeout
    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.cleanup_timeout_secs)
    }

    /// Stop grace period, engine default when unset
    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_secs.map(Duration::from_secs)
    }
}
