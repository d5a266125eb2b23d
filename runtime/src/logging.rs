//! Process-wide `tracing` subscriber setup.
//!
//! - `json` formatter: structured JSON lines for log aggregation
//! - anything else: human-readable lines with colors

use journey_core::config::LogConfig;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::formatter::JSON;

/// Subscriber installation failures.
#[derive(Error, Debug)]
pub enum LoggingInitError {
    /// The configured level is not a valid filter directive.
    #[error("invalid log filter `{directive}`: {reason}")]
    Filter {
        /// Rejected directive.
        directive: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("tracing subscriber already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG` overrides `config.level` when set.
///
/// # Errors
///
/// Returns [`LoggingInitError::Filter`] for an unparseable level and
/// [`LoggingInitError::AlreadyInitialized`] when called more than once.
pub fn init_tracing(config: &LogConfig) -> Result<(), LoggingInitError> {
    let filter = env_filter(config)?;

    let result = if config.formatter.adapter == JSON {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stdout),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(true)
                    .with_writer(std::io::stdout),
            )
            .try_init()
    };

    result.map_err(|e| LoggingInitError::AlreadyInitialized(e.to_string()))
}

fn env_filter(config: &LogConfig) -> Result<EnvFilter, LoggingInitError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| LoggingInitError::Filter {
        directive: config.level.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_level_is_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LogConfig {
            level: "journey=loudest".to_string(),
            ..LogConfig::default()
        };
        assert!(matches!(
            init_tracing(&config),
            Err(LoggingInitError::Filter { .. })
        ));
    }

    #[test]
    fn test_second_init_fails() {
        let config = LogConfig::default();
        // The first call may lose to another test in this binary; the second
        // always finds a subscriber in place.
        let _ = init_tracing(&config);
        assert!(matches!(
            init_tracing(&config),
            Err(LoggingInitError::AlreadyInitialized(_))
        ));
    }
}
