//! Production owner of journeys.
//!
//! [`App`] bundles configuration, logger, stats sink, background dispatcher
//! and the root cancellation scope. Journeys hold it weakly, so it must be
//! kept alive (in an `Arc`) for as long as any journey is in use.
//!
//! # Example
//!
//! ```rust,no_run
//! use journey_core::config::Config;
//! use journey_runtime::App;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new("orders").with_request_timeout(Duration::from_secs(5));
//! let app = App::builder(config).build()?;
//!
//! let journey = app.journey();
//! journey.trace("orders.place", "Placing order", &[]);
//! journey.end();
//!
//! app.shutdown(Duration::from_secs(10)).await?;
//! # Ok(())
//! # }
//! ```

use crate::formatter::{FormatterRegistry, RegistryError};
use crate::journey::Journey;
use crate::logger::{FormattedLogger, TracingLogger};
use crate::metrics::MetricsStats;
use crate::pool::BackgroundPool;
use journey_core::app::AppContext;
use journey_core::config::{Config, ConfigError};
use journey_core::dispatch::Dispatcher;
use journey_core::error::DispatchError;
use journey_core::log::{Field, Level, Logger};
use journey_core::scope::Scope;
use journey_core::stats::Stats;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::TryCurrentError;

/// Errors raised while assembling or stopping an [`App`].
#[derive(Error, Debug)]
pub enum AppError {
    /// The configuration is incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configured log formatter could not be built.
    #[error(transparent)]
    Formatter(#[from] RegistryError),

    /// The default background pool needs a tokio runtime.
    #[error("no tokio runtime available for the background pool: {0}")]
    NoRuntime(#[from] TryCurrentError),

    /// Background tasks were still running at shutdown.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Builder for [`App`].
pub struct AppBuilder {
    config: Config,
    logger: Option<Arc<dyn Logger>>,
    stats: Option<Arc<dyn Stats>>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    log_writer: Option<Box<dyn Write + Send>>,
    formatters: Option<FormatterRegistry>,
}

impl AppBuilder {
    /// Use `logger` instead of the default [`TracingLogger`].
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Use `stats` instead of the default [`MetricsStats`].
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<dyn Stats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Use `dispatcher` instead of a [`BackgroundPool`] on the current runtime.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Write formatted lines to `writer` using the configured formatter.
    /// Ignored when [`with_logger`](Self::with_logger) is also used.
    #[must_use]
    pub fn with_log_writer(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.log_writer = Some(writer);
        self
    }

    /// Look formatters up in `registry` instead of the built-in one.
    #[must_use]
    pub fn with_formatters(mut self, registry: FormatterRegistry) -> Self {
        self.formatters = Some(registry);
        self
    }

    /// Assemble the application.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] for an invalid configuration,
    /// [`AppError::Formatter`] when a log writer is set and the configured
    /// formatter cannot be built, and [`AppError::NoRuntime`] when no
    /// dispatcher was supplied outside a tokio runtime.
    pub fn build(self) -> Result<Arc<App>, AppError> {
        self.config.validate()?;

        let logger: Arc<dyn Logger> = match (self.logger, self.log_writer) {
            (Some(logger), _) => logger,
            (None, Some(writer)) => {
                let registry = self.formatters.unwrap_or_else(FormatterRegistry::with_defaults);
                let formatter = registry.build(&self.config.log.formatter)?;
                let min_level = self.config.log.level.parse().unwrap_or(Level::Trace);
                Arc::new(FormattedLogger::new(formatter, writer).with_min_level(min_level))
            },
            (None, None) => Arc::new(TracingLogger),
        };

        let stats = self.stats.unwrap_or_else(|| Arc::new(MetricsStats));

        let (dispatcher, pool) = match self.dispatcher {
            Some(dispatcher) => (dispatcher, None),
            None => {
                let pool = Arc::new(BackgroundPool::current(&self.config.background)?);
                (Arc::clone(&pool) as Arc<dyn Dispatcher>, Some(pool))
            },
        };

        tracing::info!(
            service = %self.config.service,
            node = %self.config.node,
            version = %self.config.version,
            "Application context ready"
        );

        Ok(Arc::new(App {
            config: self.config,
            logger,
            stats,
            dispatcher,
            pool,
            root: Scope::new(),
        }))
    }
}

/// Concrete [`AppContext`].
pub struct App {
    config: Config,
    logger: Arc<dyn Logger>,
    stats: Arc<dyn Stats>,
    dispatcher: Arc<dyn Dispatcher>,
    pool: Option<Arc<BackgroundPool>>,
    root: Scope,
}

impl App {
    /// Start building an application from `config`.
    #[must_use]
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder {
            config,
            logger: None,
            stats: None,
            dispatcher: None,
            log_writer: None,
            formatters: None,
        }
    }

    /// Start a root journey owned by this application.
    #[must_use]
    pub fn journey(self: &Arc<Self>) -> Journey {
        Journey::new(self)
    }

    /// Cancel every foreground journey and wait for background work.
    ///
    /// Background journeys are Root-typed and are not cancelled; the built-in
    /// pool stops accepting tasks and waits up to `timeout` for running ones.
    /// A custom dispatcher is not drained.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dispatch`] when the pool does not drain in time.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), AppError> {
        self.trace("app.shutdown", "Shutting down", &[Field::duration("timeout", timeout)]);
        self.root.cancel();

        if let Some(pool) = &self.pool {
            if let Err(err) = pool.drain(timeout).await {
                let fields = [Field::string("error", err.to_string())];
                self.error("app.shutdown", "Background work did not finish", &fields);
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Application-level trace line, without journey metadata.
    pub fn trace(&self, tag: &str, message: &str, fields: &[Field]) {
        self.logger.trace(tag, message, fields);
    }

    /// Application-level warning line, without journey metadata.
    pub fn warning(&self, tag: &str, message: &str, fields: &[Field]) {
        self.logger.warning(tag, message, fields);
    }

    /// Application-level error line, without journey metadata.
    pub fn error(&self, tag: &str, message: &str, fields: &[Field]) {
        self.logger.error(tag, message, fields);
    }
}

impl AppContext for App {
    fn config(&self) -> &Config {
        &self.config
    }

    fn stats(&self) -> Arc<dyn Stats> {
        Arc::clone(&self.stats)
    }

    fn logger(&self) -> Arc<dyn Logger> {
        Arc::clone(&self.logger)
    }

    fn dispatcher(&self) -> Arc<dyn Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    fn root_scope(&self) -> &Scope {
        &self.root
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("service", &self.config.service)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
