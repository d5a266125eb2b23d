//! Recording logger and stats sink
//!
//! - [`RecordingLogger`]: keeps every line emitted through it
//! - [`RecordingStats`]: keeps every count/histogram/gauge point

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only panics on a poisoned mutex

use journey_core::log::{Field, FieldValue, Level, Logger};
use journey_core::stats::{Stats, Tags};
use std::sync::{Arc, Mutex};

/// One captured log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Severity.
    pub level: Level,
    /// Tag.
    pub tag: String,
    /// Message.
    pub message: String,
    /// Fields in emission order.
    pub fields: Vec<Field>,
}

impl LogEntry {
    /// First field named `key`.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }

    /// Text rendering of the first field named `key`.
    #[must_use]
    pub fn field_str(&self, key: &str) -> Option<String> {
        self.field(key).map(ToString::to_string)
    }
}

/// Logger that keeps every line in memory.
///
/// # Example
///
/// ```
/// use journey_core::log::{Field, Logger};
/// use journey_testing::RecordingLogger;
///
/// let logger = RecordingLogger::new();
/// logger.trace("db.query", "Running query", &[Field::uint("rows", 3)]);
///
/// let entry = &logger.find("db.query")[0];
/// assert_eq!(entry.field_str("rows").as_deref(), Some("3"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct RecordingLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl RecordingLogger {
    /// Create an empty logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line so far.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Lines with the given tag.
    #[must_use]
    pub fn find(&self, tag: &str) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.tag == tag)
            .cloned()
            .collect()
    }

    /// Number of lines at `level`.
    #[must_use]
    pub fn count_level(&self, level: Level) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.level == level)
            .count()
    }

    /// Number of lines so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether nothing was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything (for test isolation).
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: Level, tag: &str, message: &str, fields: &[Field]) {
        self.entries.lock().unwrap().push(LogEntry {
            level,
            tag: tag.to_string(),
            message: message.to_string(),
            fields: fields.to_vec(),
        });
    }
}

/// Kind of a captured stats point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    /// `count`
    Count,
    /// `histogram`
    Histogram,
    /// `gauge`
    Gauge,
}

/// One captured stats point.
#[derive(Debug, Clone, PartialEq)]
pub struct StatPoint {
    /// Which method recorded it.
    pub kind: StatKind,
    /// Metric key.
    pub key: String,
    /// Recorded value.
    pub value: f64,
    /// Tags.
    pub tags: Tags,
}

/// Stats sink that keeps every point in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingStats {
    points: Arc<Mutex<Vec<StatPoint>>>,
}

impl RecordingStats {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every point so far.
    #[must_use]
    pub fn points(&self) -> Vec<StatPoint> {
        self.points.lock().unwrap().clone()
    }

    /// Points recorded under `key`.
    #[must_use]
    pub fn by_key(&self, key: &str) -> Vec<StatPoint> {
        self.points
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.key == key)
            .cloned()
            .collect()
    }

    /// Forget everything (for test isolation).
    pub fn clear(&self) {
        self.points.lock().unwrap().clear();
    }

    fn record(&self, kind: StatKind, key: &str, value: f64, tags: &Tags) {
        self.points.lock().unwrap().push(StatPoint {
            kind,
            key: key.to_string(),
            value,
            tags: tags.clone(),
        });
    }
}

impl Stats for RecordingStats {
    fn count(&self, key: &str, value: f64, tags: &Tags) {
        self.record(StatKind::Count, key, value, tags);
    }

    fn histogram(&self, key: &str, value: f64, tags: &Tags) {
        self.record(StatKind::Histogram, key, value, tags);
    }

    fn gauge(&self, key: &str, value: f64, tags: &Tags) {
        self.record(StatKind::Gauge, key, value, tags);
    }
}
