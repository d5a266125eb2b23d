//! Log line formatters and their registry.
//!
//! Formatters are looked up by name from an explicit [`FormatterRegistry`]
//! that the application builds at startup. Registration reports duplicates
//! and empty names as errors.
//!
//! # Example
//!
//! ```
//! use journey_core::config::FormatterConfig;
//! use journey_runtime::formatter::FormatterRegistry;
//!
//! let registry = FormatterRegistry::with_defaults();
//! assert_eq!(registry.adapters(), vec!["json", "logf"]);
//!
//! let formatter = registry.build(&FormatterConfig::default()).unwrap();
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use journey_core::config::FormatterConfig;
use journey_core::log::{Field, FieldValue, Level};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Name of the JSON formatter.
pub const JSON: &str = "json";

/// Name of the `key=value` text formatter.
pub const LOGF: &str = "logf";

/// Registry and formatting errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An adapter with this name is already registered.
    #[error("log formatter `{0}` is already registered")]
    Duplicate(String),

    /// Adapter names must not be empty.
    #[error("log formatter name must not be empty")]
    EmptyName,

    /// No adapter with this name.
    #[error("log formatter not found <{0}>")]
    NotFound(String),

    /// The adapter refused its settings.
    #[error("invalid setting `{key}` for log formatter: {reason}")]
    InvalidConfig {
        /// Offending key.
        key: String,
        /// Why it was refused.
        reason: String,
    },

    /// A record could not be rendered.
    #[error("cannot format log record: {0}")]
    Format(String),
}

/// One log line, as handed to a [`Formatter`].
#[derive(Debug, Clone)]
pub struct Record<'a> {
    /// Emission time.
    pub time: DateTime<Utc>,
    /// Severity.
    pub level: Level,
    /// Machine-friendly tag (`ctx.journey.new`, ...).
    pub tag: &'a str,
    /// Human message.
    pub message: &'a str,
    /// Ordered fields.
    pub fields: &'a [Field],
}

/// Renders a [`Record`] to a single line (without trailing newline).
pub trait Formatter: Send + Sync {
    /// Render one record.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Format`] when the record cannot be rendered.
    fn format(&self, record: &Record<'_>) -> Result<String, RegistryError>;
}

/// Builds a formatter from adapter-specific settings.
pub type Adapter = fn(&HashMap<String, String>) -> Result<Box<dyn Formatter>, RegistryError>;

/// Named formatter adapters.
#[derive(Debug, Default)]
pub struct FormatterRegistry {
    adapters: RwLock<BTreeMap<String, Adapter>>,
}

impl FormatterRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in `json` and `logf` adapters.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut adapters = BTreeMap::new();
        adapters.insert(JSON.to_string(), JsonFormatter::adapter as Adapter);
        adapters.insert(LOGF.to_string(), LogfFormatter::adapter as Adapter);
        Self {
            adapters: RwLock::new(adapters),
        }
    }

    /// Make an adapter available under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyName`] or [`RegistryError::Duplicate`].
    pub fn register(&self, name: &str, adapter: Adapter) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let mut adapters = self
            .adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if adapters.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        adapters.insert(name.to_string(), adapter);
        Ok(())
    }

    /// Registered adapter names, sorted.
    #[must_use]
    pub fn adapters(&self) -> Vec<String> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Instantiate the adapter selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for an unknown adapter, or the
    /// adapter's own error for invalid settings.
    pub fn build(&self, config: &FormatterConfig) -> Result<Box<dyn Formatter>, RegistryError> {
        let adapter = self
            .adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&config.adapter)
            .copied()
            .ok_or_else(|| RegistryError::NotFound(config.adapter.clone()))?;
        adapter(&config.config)
    }
}

/// One JSON object per line.
///
/// Settings: `time_key` (default `time`), `message_key` (default `msg`).
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    time_key: String,
    message_key: String,
}

impl JsonFormatter {
    fn adapter(config: &HashMap<String, String>) -> Result<Box<dyn Formatter>, RegistryError> {
        Ok(Box::new(Self {
            time_key: config.get("time_key").cloned().unwrap_or_else(|| "time".to_string()),
            message_key: config
                .get("message_key")
                .cloned()
                .unwrap_or_else(|| "msg".to_string()),
        }))
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self {
            time_key: "time".to_string(),
            message_key: "msg".to_string(),
        }
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &Record<'_>) -> Result<String, RegistryError> {
        let mut object = serde_json::Map::new();
        object.insert(
            self.time_key.clone(),
            record.time.to_rfc3339_opts(SecondsFormat::Micros, true).into(),
        );
        object.insert("level".to_string(), record.level.as_str().into());
        object.insert("tag".to_string(), record.tag.into());
        object.insert(self.message_key.clone(), record.message.into());

        for field in record.fields {
            let value =
                serde_json::to_value(&field.value).map_err(|e| RegistryError::Format(e.to_string()))?;
            object.insert(field.key.clone(), value);
        }

        serde_json::to_string(&object).map_err(|e| RegistryError::Format(e.to_string()))
    }
}

/// Human-readable `key=value` lines.
///
/// Settings: `time` = `on` (default) or `off` to omit the timestamp.
#[derive(Debug, Clone, Default)]
pub struct LogfFormatter {
    omit_time: bool,
}

impl LogfFormatter {
    fn adapter(config: &HashMap<String, String>) -> Result<Box<dyn Formatter>, RegistryError> {
        let omit_time = match config.get("time").map(String::as_str) {
            None | Some("on") => false,
            Some("off") => true,
            Some(other) => {
                return Err(RegistryError::InvalidConfig {
                    key: "time".to_string(),
                    reason: format!("expected `on` or `off`, got `{other}`"),
                });
            },
        };
        Ok(Box::new(Self { omit_time }))
    }
}

impl Formatter for LogfFormatter {
    fn format(&self, record: &Record<'_>) -> Result<String, RegistryError> {
        let mut line = String::new();
        let fail = |e: std::fmt::Error| RegistryError::Format(e.to_string());

        if !self.omit_time {
            write!(line, "{} ", record.time.to_rfc3339_opts(SecondsFormat::Millis, true))
                .map_err(fail)?;
        }
        write!(
            line,
            "{:<7} {} {}",
            record.level.as_str().to_uppercase(),
            record.tag,
            quote(record.message)
        )
        .map_err(fail)?;

        for field in record.fields {
            let value = match &field.value {
                FieldValue::String(s) | FieldValue::Object(s) => quote(s),
                other => other.to_string(),
            };
            write!(line, " {}={}", field.key, value).map_err(fail)?;
        }
        Ok(line)
    }
}

fn quote(s: &str) -> String {
    if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '=' || c == '"') {
        format!("{s:?}")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn record(fields: &[Field]) -> Record<'_> {
        Record {
            time: DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            level: Level::Warning,
            tag: "db.slow",
            message: "Slow query",
            fields,
        }
    }

    fn fake_adapter(_: &HashMap<String, String>) -> Result<Box<dyn Formatter>, RegistryError> {
        Ok(Box::new(LogfFormatter::default()))
    }

    #[test]
    fn test_defaults_are_sorted() {
        let registry = FormatterRegistry::with_defaults();
        assert_eq!(registry.adapters(), vec!["json".to_string(), "logf".to_string()]);
    }

    #[test]
    fn test_duplicate_registration_is_an_error() {
        let registry = FormatterRegistry::with_defaults();
        assert_eq!(
            registry.register(JSON, fake_adapter),
            Err(RegistryError::Duplicate("json".to_string()))
        );
        assert_eq!(registry.register("", fake_adapter), Err(RegistryError::EmptyName));
        assert!(registry.register("plain", fake_adapter).is_ok());
        assert_eq!(registry.adapters(), vec!["json", "logf", "plain"]);
    }

    #[test]
    fn test_unknown_adapter() {
        let registry = FormatterRegistry::new();
        let err = registry.build(&FormatterConfig::default()).err().unwrap();
        assert_eq!(err, RegistryError::NotFound("logf".to_string()));
    }

    #[test]
    fn test_logf_line() {
        let mut config = FormatterConfig::default();
        config.config.insert("time".to_string(), "off".to_string());
        let formatter = FormatterRegistry::with_defaults().build(&config).unwrap();

        let fields = [Field::string("step", "0001"), Field::uint("rows", 12)];
        let line = formatter.format(&record(&fields)).unwrap();

        assert_eq!(line, "WARNING db.slow \"Slow query\" step=0001 rows=12");
    }

    #[test]
    fn test_logf_rejects_bad_setting() {
        let mut config = FormatterConfig::default();
        config.config.insert("time".to_string(), "sometimes".to_string());
        let err = FormatterRegistry::with_defaults().build(&config).err().unwrap();
        assert!(matches!(err, RegistryError::InvalidConfig { .. }));
    }

    #[test]
    fn test_json_line() {
        let config = FormatterConfig {
            adapter: JSON.to_string(),
            config: HashMap::new(),
        };
        let formatter = FormatterRegistry::with_defaults().build(&config).unwrap();

        let fields = [Field::string("id", "3f2a"), Field::bool("cached", true)];
        let line = formatter.format(&record(&fields)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(parsed["level"], "warning");
        assert_eq!(parsed["tag"], "db.slow");
        assert_eq!(parsed["msg"], "Slow query");
        assert_eq!(parsed["id"], "3f2a");
        assert_eq!(parsed["cached"], true);
    }
}
