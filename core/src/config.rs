//! Application configuration consumed by journeys.
//!
//! Loading from remote backends is left to the application; this module only
//! defines the shape, its defaults and a couple of local loaders.
//!
//! # Example
//!
//! ```
//! use journey_core::config::Config;
//! use std::time::Duration;
//!
//! let config = Config::from_json(r#"{
//!     "service": "checkout",
//!     "node": "eu-1",
//!     "version": "1.4.0",
//!     "request": { "timeout_ms": 2500 }
//! }"#).unwrap();
//!
//! assert_eq!(config.request.timeout(), Duration::from_millis(2500));
//! assert_eq!(config.log.formatter.adapter, "logf");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration document is malformed.
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A required identifier is empty.
    #[error("config field `{0}` must not be empty")]
    Missing(&'static str),
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name, attached to every `log.level` stats event.
    pub service: String,
    /// Node (host/instance) identifier.
    pub node: String,
    /// Deployed version.
    pub version: String,
    /// Inbound request settings.
    pub request: RequestConfig,
    /// Logging settings.
    pub log: LogConfig,
    /// Background dispatcher settings.
    pub background: BackgroundConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: "unknown".to_string(),
            node: "localhost".to_string(),
            version: "0.0.0".to_string(),
            request: RequestConfig::default(),
            log: LogConfig::default(),
            background: BackgroundConfig::default(),
        }
    }
}

impl Config {
    /// Create a configuration for the given service with default sections.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request = RequestConfig::from_timeout(timeout);
        self
    }

    /// Set the node identifier.
    #[must_use]
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = node.into();
        self
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Missing`] when `service` is empty.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise the
    /// same errors as [`Config::from_json`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Check that identifiers used as stats tags are present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming the first empty field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.is_empty() {
            return Err(ConfigError::Missing("service"));
        }
        if self.node.is_empty() {
            return Err(ConfigError::Missing("node"));
        }
        if self.version.is_empty() {
            return Err(ConfigError::Missing("version"));
        }
        Ok(())
    }
}

/// Inbound request settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Request timeout in milliseconds. `0` disables the journey deadline.
    pub timeout_ms: u64,
}

impl RequestConfig {
    /// Build from a [`Duration`], truncated to whole milliseconds.
    #[must_use]
    pub fn from_timeout(timeout: Duration) -> Self {
        Self {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Request timeout; zero means "no deadline".
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum level, as understood by `tracing` filters (`trace`, `warn`, ...).
    pub level: String,
    /// Line formatter selection.
    pub formatter: FormatterConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            formatter: FormatterConfig::default(),
        }
    }
}

/// Selects a registered log formatter and passes it free-form settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Registered adapter name (`json`, `logf`, ...).
    pub adapter: String,
    /// Adapter-specific settings.
    pub config: HashMap<String, String>,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            adapter: "logf".to_string(),
            config: HashMap::new(),
        }
    }
}

/// Background dispatcher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Maximum number of tasks running at once.
    pub max_in_flight: usize,
    /// How long shutdown waits for in-flight tasks, in milliseconds.
    pub drain_timeout_ms: u64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 256,
            drain_timeout_ms: 30_000,
        }
    }
}

impl BackgroundConfig {
    /// Drain timeout as a [`Duration`].
    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
