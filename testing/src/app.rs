//! In-memory application context

use crate::dispatchers::InlineDispatcher;
use crate::recording::{RecordingLogger, RecordingStats};
use journey_core::app::AppContext;
use journey_core::config::Config;
use journey_core::dispatch::Dispatcher;
use journey_core::log::Logger;
use journey_core::scope::Scope;
use journey_core::stats::Stats;
use std::sync::Arc;
use std::time::Duration;

/// [`AppContext`] whose logger and stats sink record everything.
///
/// # Example
///
/// ```
/// use journey_core::app::AppContext;
/// use journey_core::log::Logger;
/// use journey_testing::test_app;
///
/// let app = test_app("orders");
/// app.logger().trace("boot", "Started", &[]);
/// assert_eq!(app.log.len(), 1);
/// ```
pub struct TestApp {
    config: Config,
    /// Every line logged through this owner.
    pub log: RecordingLogger,
    /// Every stats point recorded through this owner.
    pub stats: RecordingStats,
    dispatcher: Arc<dyn Dispatcher>,
    root: Scope,
}

impl TestApp {
    /// Owner with `config` and an [`InlineDispatcher`].
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_dispatcher(config, Arc::new(InlineDispatcher::new()))
    }

    /// Owner with `config` and a custom dispatcher.
    #[must_use]
    pub fn with_dispatcher(config: Config, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            config,
            log: RecordingLogger::new(),
            stats: RecordingStats::new(),
            dispatcher,
            root: Scope::new(),
        }
    }
}

impl AppContext for TestApp {
    fn config(&self) -> &Config {
        &self.config
    }

    fn stats(&self) -> Arc<dyn Stats> {
        Arc::new(self.stats.clone())
    }

    fn logger(&self) -> Arc<dyn Logger> {
        Arc::new(self.log.clone())
    }

    fn dispatcher(&self) -> Arc<dyn Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    fn root_scope(&self) -> &Scope {
        &self.root
    }
}

/// Owner for `service` with no request timeout and an inline dispatcher.
#[must_use]
pub fn test_app(service: &str) -> Arc<TestApp> {
    Arc::new(TestApp::new(Config::new(service)))
}

/// Owner for `service` whose root journeys expire after `timeout`.
#[must_use]
pub fn test_app_with_timeout(service: &str, timeout: Duration) -> Arc<TestApp> {
    Arc::new(TestApp::new(
        Config::new(service).with_request_timeout(timeout),
    ))
}
