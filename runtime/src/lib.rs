//! # Journey Runtime
//!
//! Runtime implementation of per-request propagation contexts.
//!
//! ## Core Components
//!
//! - **Journey**: identity, cancellation, deadline and causality tracking for
//!   one logical request and everything branched from it
//! - **Stepper**: the tree-shaped counter behind a journey's `step` field
//! - **`BackgroundPool`**: bounded tokio-backed dispatcher for `Journey::bg`
//! - **App**: production owner wiring config, logger, stats and dispatcher
//! - **Logging / metrics adapters**: `tracing`, formatter registry and the
//!   `metrics` facade
//!
//! ## Example
//!
//! ```rust,no_run
//! use journey_core::config::Config;
//! use journey_core::log::Field;
//! use journey_runtime::{App, JourneyKind};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = App::builder(Config::new("orders")).build()?;
//!
//! let journey = app.journey();
//! journey.trace("orders.place", "Placing order", &[Field::string("sku", "A-1")]);
//!
//! let sub = journey.branch_off(JourneyKind::Child);
//! sub.trace("inventory.reserve", "Reserving stock", &[]);
//!
//! journey.bg(|bg| bg.trace("orders.email", "Sending confirmation", &[]))?;
//! journey.end();
//! # Ok(())
//! # }
//! ```

/// Production owner
pub mod app;

/// Log line formatters and their registry
pub mod formatter;

/// Propagation node
pub mod journey;

/// Logger adapters
pub mod logger;

/// `tracing` subscriber setup
pub mod logging;

/// Prometheus metrics for observability
pub mod metrics;

/// Background dispatcher
pub mod pool;

/// Causality counter
pub mod stepper;

pub use app::{App, AppBuilder, AppError};
pub use formatter::{Formatter, FormatterRegistry, RegistryError};
pub use journey::{Journey, JourneyKind};
pub use logger::{FormattedLogger, TracingLogger};
pub use logging::{LoggingInitError, init_tracing};
pub use metrics::{MetricsStats, describe_metrics};
pub use pool::BackgroundPool;
pub use stepper::Stepper;
