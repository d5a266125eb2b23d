//! Logger implementations.

use crate::formatter::{Formatter, Record};
use chrono::Utc;
use journey_core::log::{Field, Level, Logger};
use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// Forwards lines to the `tracing` facade.
///
/// The tag becomes a structured `tag` field; journey fields are rendered as a
/// single `fields` value so that any subscriber can display them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, tag: &str, message: &str, fields: &[Field]) {
        let fields = render(fields);
        match level {
            Level::Trace => tracing::trace!(tag, fields = %fields, "{message}"),
            Level::Warning => tracing::warn!(tag, fields = %fields, "{message}"),
            Level::Error => tracing::error!(tag, fields = %fields, "{message}"),
        }
    }
}

fn render(fields: &[Field]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes formatted lines to a byte sink.
pub struct FormattedLogger {
    formatter: Box<dyn Formatter>,
    writer: Mutex<Box<dyn Write + Send>>,
    min_level: Level,
}

impl FormattedLogger {
    /// Log every level through `formatter` into `writer`.
    pub fn new(formatter: Box<dyn Formatter>, writer: Box<dyn Write + Send>) -> Self {
        Self {
            formatter,
            writer: Mutex::new(writer),
            min_level: Level::Trace,
        }
    }

    /// Drop lines below `level`.
    #[must_use]
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }
}

impl Logger for FormattedLogger {
    fn log(&self, level: Level, tag: &str, message: &str, fields: &[Field]) {
        if level < self.min_level {
            return;
        }

        let record = Record {
            time: Utc::now(),
            level,
            tag,
            message,
            fields,
        };
        let line = match self.formatter.format(&record) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(tag, error = %err, "Dropping unformattable log line");
                return;
            },
        };

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        // A broken sink must not take the journey down with it.
        let _ = writeln!(writer, "{line}");
    }
}

impl std::fmt::Debug for FormattedLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormattedLogger")
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}
