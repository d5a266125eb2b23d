//! Owner contract.

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::log::Logger;
use crate::scope::Scope;
use crate::stats::Stats;
use std::sync::Arc;

/// The application-level context that owns journeys.
///
/// One owner is shared by many journeys and must outlive all of them.
/// Journeys hold it weakly.
pub trait AppContext: Send + Sync {
    /// Application configuration.
    fn config(&self) -> &Config;

    /// Statistics sink.
    fn stats(&self) -> Arc<dyn Stats>;

    /// Logger.
    fn logger(&self) -> Arc<dyn Logger>;

    /// Background dispatch facility.
    fn dispatcher(&self) -> Arc<dyn Dispatcher>;

    /// Scope every root journey derives from. Cancelling it cancels all
    /// foreground work of the application.
    fn root_scope(&self) -> &Scope;
}
