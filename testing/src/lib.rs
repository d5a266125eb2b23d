//! # Journey Testing
//!
//! Test doubles for code that creates or consumes journeys.
//!
//! This crate provides:
//! - Recording implementations of the logger and stats contracts
//! - Deterministic dispatchers (inline, per-thread, rejecting)
//! - An in-memory application context
//!
//! ## Example
//!
//! ```ignore
//! use journey_runtime::Journey;
//! use journey_testing::test_app;
//!
//! #[test]
//! fn test_order_flow() {
//!     let app = test_app("orders");
//!     let journey = Journey::new(&app);
//!
//!     place_order(&journey, "A-1");
//!
//!     assert_eq!(app.log.find("orders.place").len(), 1);
//! }
//! ```

/// In-memory application context
pub mod app;

/// Deterministic dispatchers
pub mod dispatchers;

/// Recording logger and stats sink
pub mod recording;

pub use app::{TestApp, test_app, test_app_with_timeout};
pub use dispatchers::{InlineDispatcher, RejectingDispatcher, ThreadDispatcher};
pub use recording::{LogEntry, RecordingLogger, RecordingStats, StatKind, StatPoint};
