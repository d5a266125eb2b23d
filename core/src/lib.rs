//! # Journey Core
//!
//! Contracts and primitives for per-request propagation contexts.
//!
//! A *journey* is the logical unit of work spanning one inbound trigger and
//! everything causally derived from it, including detached background work.
//! This crate holds what every journey implementation and every collaborator
//! agrees on:
//!
//! - **Scope**: the cancellation tree (one-shot, monotone, deadline aware)
//! - **Cancellable**: the capability trait `{deadline, done, err, value}`
//! - **`AppContext`**: the owner supplying config, logger, stats and dispatcher
//! - **Logger / Stats / Dispatcher**: collaborator contracts
//! - **Config**: the configuration shape journeys read
//!
//! The journey node itself lives in `journey-runtime`.
//!
//! ## Example
//!
//! ```
//! use journey_core::scope::{Cancellable, Scope};
//! use std::time::Duration;
//!
//! fn is_late(ctx: &impl Cancellable) -> bool {
//!     ctx.err().is_some()
//! }
//!
//! let scope = Scope::with_timeout(Duration::from_secs(30));
//! assert!(!is_late(&scope));
//! ```

/// Owner contract
pub mod app;

/// Application configuration
pub mod config;

/// Background dispatch contract
pub mod dispatch;

/// Error taxonomy
pub mod error;

/// Logger contract and log fields
pub mod log;

/// Cancellation tree
pub mod scope;

/// Statistics contract
pub mod stats;

pub use app::AppContext;
pub use config::Config;
pub use dispatch::{Dispatcher, Task};
pub use error::{CancelError, DispatchError, JourneyError};
pub use log::{Field, Level, Logger};
pub use scope::{Cancellable, Done, Scope, ScopeState, Value};
pub use stats::{Stats, Tags};
