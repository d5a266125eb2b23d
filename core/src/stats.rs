//! Statistics sink contract.

use std::collections::BTreeMap;

/// Tags attached to a stats event.
///
/// Ordered so that rendered label sets are deterministic.
pub type Tags = BTreeMap<String, String>;

/// Counter/histogram/gauge event sink.
pub trait Stats: Send + Sync {
    /// Add `value` to the counter `key`.
    fn count(&self, key: &str, value: f64, tags: &Tags);

    /// Record one histogram sample.
    fn histogram(&self, key: &str, value: f64, tags: &Tags);

    /// Set the gauge `key`.
    fn gauge(&self, key: &str, value: f64, tags: &Tags);

    /// Increment the counter `key` by one.
    fn inc(&self, key: &str, tags: &Tags) {
        self.count(key, 1.0, tags);
    }
}

/// Stats sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStats;

impl Stats for NullStats {
    fn count(&self, _key: &str, _value: f64, _tags: &Tags) {}
    fn histogram(&self, _key: &str, _value: f64, _tags: &Tags) {}
    fn gauge(&self, _key: &str, _value: f64, _tags: &Tags) {}
}

/// Build a [`Tags`] map from string pairs.
///
/// ```
/// use journey_core::stats::tags;
///
/// let t = tags([("tag", "db.query"), ("level", "trace")]);
/// assert_eq!(t["tag"], "db.query");
/// ```
pub fn tags<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Tags {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
