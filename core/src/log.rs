//! Logger contract and structured log fields.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Fine-grained diagnostic line.
    Trace,
    /// Something unexpected that did not fail the journey.
    Warning,
    /// A failure.
    Error,
}

impl Level {
    /// Lowercase name used in stats tags and formatted output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown level name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log level `{0}`")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Accepts `tracing` filter names too; `debug` and `info` fold into
    /// [`Level::Trace`], the finest level journeys emit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" => Ok(Self::Trace),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Value carried by a [`Field`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Text.
    String(String),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    Uint(u64),
    /// Floating point number.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Wall-clock time, rendered as RFC 3339.
    Time(DateTime<Utc>),
    /// Duration, rendered in milliseconds.
    Duration(u64),
    /// `Debug` rendering of an arbitrary value.
    Object(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) | Self::Object(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Uint(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Time(t) => f.write_str(&t.to_rfc3339()),
            Self::Duration(ms) => write!(f, "{ms}ms"),
        }
    }
}

/// An ordered key/value pair attached to a log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    /// Field name.
    pub key: String,
    /// Field value.
    pub value: FieldValue,
}

impl Field {
    /// Text field.
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: FieldValue::String(value.into()),
        }
    }

    /// Signed integer field.
    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self {
            key: key.into(),
            value: FieldValue::Int(value),
        }
    }

    /// Unsigned integer field.
    pub fn uint(key: impl Into<String>, value: u64) -> Self {
        Self {
            key: key.into(),
            value: FieldValue::Uint(value),
        }
    }

    /// Float field.
    pub fn float(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value: FieldValue::Float(value),
        }
    }

    /// Boolean field.
    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self {
            key: key.into(),
            value: FieldValue::Bool(value),
        }
    }

    /// Time field.
    pub fn time(key: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            value: FieldValue::Time(value),
        }
    }

    /// Duration field (milliseconds).
    pub fn duration(key: impl Into<String>, value: Duration) -> Self {
        Self {
            key: key.into(),
            value: FieldValue::Duration(u64::try_from(value.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    /// Field holding the `Debug` rendering of `value`.
    pub fn object(key: impl Into<String>, value: &dyn fmt::Debug) -> Self {
        Self {
            key: key.into(),
            value: FieldValue::Object(format!("{value:?}")),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Severity-leveled log sink.
///
/// Implementations decide how lines are physically emitted; journeys only
/// enrich the field list before calling [`Logger::log`].
pub trait Logger: Send + Sync {
    /// Emit one line.
    fn log(&self, level: Level, tag: &str, message: &str, fields: &[Field]);

    /// Emit a trace line.
    fn trace(&self, tag: &str, message: &str, fields: &[Field]) {
        self.log(Level::Trace, tag, message, fields);
    }

    /// Emit a warning line.
    fn warning(&self, tag: &str, message: &str, fields: &[Field]) {
        self.log(Level::Warning, tag, message, fields);
    }

    /// Emit an error line.
    fn error(&self, tag: &str, message: &str, fields: &[Field]) {
        self.log(Level::Error, tag, message, fields);
    }
}

/// Logger that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: Level, _tag: &str, _message: &str, _fields: &[Field]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_display() {
        assert_eq!(Field::string("id", "abc").to_string(), "id=abc");
        assert_eq!(Field::uint("n", 7).to_string(), "n=7");
        assert_eq!(
            Field::duration("took", Duration::from_millis(1500)).to_string(),
            "took=1500ms"
        );
    }

    #[test]
    fn test_object_field_uses_debug() {
        let field = Field::object("key", &"request-id");
        assert_eq!(field.value, FieldValue::Object("\"request-id\"".to_string()));
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Warning);
        assert!(Level::Warning < Level::Error);
        assert_eq!(Level::Warning.to_string(), "warning");
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("WARN".parse::<Level>(), Ok(Level::Warning));
        assert_eq!("info".parse::<Level>(), Ok(Level::Trace));
        assert_eq!("error".parse::<Level>(), Ok(Level::Error));
        assert!("loud".parse::<Level>().is_err());
    }
}
