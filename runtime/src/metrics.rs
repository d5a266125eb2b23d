//! Prometheus-compatible metrics for journeys and the background pool.
//!
//! Journeys report through the [`Stats`] contract; [`MetricsStats`] forwards
//! those calls to the `metrics` facade so that any installed recorder sees
//! them. [`MetricsServer`] installs the Prometheus recorder; exposing the
//! rendered text over HTTP is left to the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use journey_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Later, from an HTTP handler:
//! let body = server.render().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

use journey_core::stats::{Stats, Tags};
use metrics::{Label, describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Histogram of journey log lines, tagged by `tag`.
pub const LOG: &str = "log";

/// Histogram of journey log lines, tagged by level, tag and application
/// identity.
pub const LOG_LEVEL: &str = "log.level";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder holder.
///
/// No listener is bound and [`App`](crate::App) does not start one. The
/// caller owns serving [`render`](Self::render) on its own HTTP endpoint;
/// `addr` is the address that endpoint is expected at and is only logged.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Describe the journey metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] for an invalid bucket layout and
    /// [`MetricsError::Install`] if installation fails for a reason other than
    /// a recorder already being present.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        describe_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Recorder handle, once started.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register descriptions for every metric this crate emits.
pub fn describe_metrics() {
    describe_histogram!(LOG, "Journey log lines, by tag");
    describe_histogram!(
        LOG_LEVEL,
        "Journey log lines, by level, tag, service, node and version"
    );

    describe_counter!(
        "journey_bg_tasks_dispatched_total",
        "Background tasks accepted by the pool"
    );
    describe_counter!(
        "journey_bg_tasks_completed_total",
        "Background tasks that ran to completion"
    );
    describe_counter!(
        "journey_bg_tasks_rejected_total",
        "Background tasks refused by the pool, by reason"
    );
    describe_histogram!(
        "journey_bg_task_duration_seconds",
        "Time spent running a background task"
    );
    describe_gauge!(
        "journey_bg_tasks_in_flight",
        "Background tasks currently running"
    );
}

/// [`Stats`] implementation backed by the `metrics` facade.
///
/// Tags become labels. Counter values are truncated to whole increments.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsStats;

fn labels(tags: &Tags) -> Vec<Label> {
    tags.iter()
        .map(|(k, v)| Label::new(k.clone(), v.clone()))
        .collect()
}

impl Stats for MetricsStats {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Negative counts clamp to 0
    fn count(&self, key: &str, value: f64, tags: &Tags) {
        counter!(key.to_string(), labels(tags)).increment(value.max(0.0) as u64);
    }

    fn histogram(&self, key: &str, value: f64, tags: &Tags) {
        histogram!(key.to_string(), labels(tags)).record(value);
    }

    fn gauge(&self, key: &str, value: f64, tags: &Tags) {
        gauge!(key.to_string(), labels(tags)).set(value);
    }
}

/// Background pool metrics recorder.
pub struct PoolMetrics;

impl PoolMetrics {
    /// Record an accepted task.
    pub fn record_dispatched(task: &'static str) {
        counter!("journey_bg_tasks_dispatched_total", "task" => task).increment(1);
        gauge!("journey_bg_tasks_in_flight").increment(1.0);
    }

    /// Record a task that returned.
    pub fn record_completed(task: &'static str, duration: Duration) {
        counter!("journey_bg_tasks_completed_total", "task" => task).increment(1);
        histogram!("journey_bg_task_duration_seconds", "task" => task)
            .record(duration.as_secs_f64());
    }

    /// Record a task leaving the pool, whether it returned or unwound.
    pub fn record_released() {
        gauge!("journey_bg_tasks_in_flight").decrement(1.0);
    }

    /// Record a refused task.
    pub fn record_rejected(task: &'static str, reason: &'static str) {
        counter!("journey_bg_tasks_rejected_total", "task" => task, "reason" => reason)
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use journey_core::stats::tags;

    #[test]
    fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn test_labels_follow_tag_order() {
        let labels = labels(&tags([("tag", "ctx.journey.new"), ("level", "trace")]));
        let keys: Vec<_> = labels.iter().map(Label::key).collect();
        assert_eq!(keys, vec!["level", "tag"]);
    }

    #[test]
    fn test_metrics_server_render() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);
        server.start().unwrap();

        MetricsStats.histogram(LOG, 1.0, &tags([("tag", "orders.place")]));
        MetricsStats.count("orders_total", 2.0, &Tags::new());
        PoolMetrics::record_dispatched("journey.bg");
        PoolMetrics::record_completed("journey.bg", Duration::from_millis(5));
        PoolMetrics::record_released();

        // Another test binary may own the global recorder.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("orders_total"));
            assert!(rendered.contains("journey_bg_tasks_dispatched_total"));
            assert!(rendered.contains("journey_bg_task_duration_seconds"));
        }
    }
}
