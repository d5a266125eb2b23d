//! Journey: the per-request propagation context.
//!
//! A journey is created when a request first enters the system and follows
//! it across synchronous calls ([`Journey::branch_off`] with
//! [`JourneyKind::Child`]) and detached background work ([`Journey::bg`]).
//! Every journey of one lineage shares the same identity; each owns its own
//! [`Stepper`] slot and its own [`Scope`].
//!
//! # Example
//!
//! ```ignore
//! let journey = Journey::new(&app);
//! journey.trace("orders.place", "Placing order", &[Field::string("sku", sku)]);
//!
//! let sub = journey.branch_off(JourneyKind::Child);
//! inventory.reserve(&sub, sku)?;
//!
//! journey.bg(|bg| {
//!     bg.trace("orders.email", "Sending confirmation", &[]);
//! })?;
//!
//! journey.end();
//! ```

use crate::stepper::Stepper;
use chrono::Utc;
use journey_core::app::AppContext;
use journey_core::config::Config;
use journey_core::dispatch::Task;
use journey_core::error::{CancelError, JourneyError};
use journey_core::log::{Field, Level, Logger};
use journey_core::scope::{Cancellable, Done, Scope, Value};
use journey_core::stats::{Stats, tags};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// How a branch relates to its originator's cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JourneyKind {
    /// Cancelled with its parent; inherits the parent's deadline.
    Child,
    /// Cancelled only by itself. Shares the identity, nothing else.
    Root,
}

struct Node {
    kind: JourneyKind,
    id: Arc<str>,
    scope: Scope,
    stepper: Stepper,
    app: Weak<dyn AppContext>,
    logger: Arc<dyn Logger>,
}

/// Per-request propagation context.
///
/// Cloning yields another handle to the same node; use
/// [`branch_off`](Self::branch_off) to create a new node.
///
/// A journey holds its owner weakly. Using a journey after its owner has been
/// dropped is a programming error and panics.
#[derive(Clone)]
pub struct Journey {
    inner: Arc<Node>,
}

impl Journey {
    /// Start a new root journey owned by `app`.
    ///
    /// Mints a fresh identity. If the owner's request timeout is non-zero the
    /// journey gets a deadline of `now + timeout`; either way it is cancelled
    /// when the owner's root scope is.
    pub fn new<A: AppContext + 'static>(app: &Arc<A>) -> Self {
        let owner: Arc<dyn AppContext> = Arc::clone(app) as Arc<dyn AppContext>;
        Self::from_owner(&owner)
    }

    /// Start a new root journey from a type-erased owner.
    pub fn from_owner(app: &Arc<dyn AppContext>) -> Self {
        let id = Uuid::new_v4().to_string();
        let logger = app.logger();

        logger.trace("ctx.journey.new", "Start journey", &[Field::string("id", &id)]);

        let timeout = app.config().request.timeout();
        let scope = if timeout.is_zero() {
            app.root_scope().child()
        } else {
            app.root_scope().child_with_timeout(timeout)
        };

        let journey = Self {
            inner: Arc::new(Node {
                kind: JourneyKind::Root,
                id: Arc::from(id),
                scope,
                stepper: Stepper::new(),
                app: Arc::downgrade(app),
                logger,
            }),
        };

        if !timeout.is_zero() {
            let deadline = chrono::Duration::from_std(timeout)
                .ok()
                .and_then(|timeout| Utc::now().checked_add_signed(timeout));
            let field = match deadline {
                Some(deadline) => Field::time("deadline", deadline),
                None => Field::duration("timeout", timeout),
            };
            journey.trace("ctx.journey.deadline", "Set deadline", &[field]);
        }

        journey
    }

    /// Globally unique identifier shared by the whole lineage.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// First group of the identifier, for display. Not guaranteed unique.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.inner.id.split('-').next().unwrap_or(&self.inner.id)
    }

    /// Kind this node was created as.
    #[must_use]
    pub fn kind(&self) -> JourneyKind {
        self.inner.kind
    }

    /// Rendered causality path of this node.
    #[must_use]
    pub fn step(&self) -> String {
        self.inner.stepper.to_string()
    }

    /// Owning application context.
    ///
    /// # Panics
    ///
    /// Panics if the owner has been dropped.
    #[must_use]
    #[allow(clippy::expect_used)] // Owner outliving its journeys is an invariant
    pub fn app(&self) -> Arc<dyn AppContext> {
        self.inner
            .app
            .upgrade()
            .expect("journey used after its application context was dropped")
    }

    /// Application configuration.
    ///
    /// # Panics
    ///
    /// Panics if the owner has been dropped.
    #[must_use]
    pub fn app_config(&self) -> Config {
        self.app().config().clone()
    }

    /// Owner's statistics sink.
    ///
    /// # Panics
    ///
    /// Panics if the owner has been dropped.
    #[must_use]
    pub fn stats(&self) -> Arc<dyn Stats> {
        self.app().stats()
    }

    /// Underlying cancellation scope.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    /// Derive a new node from this one.
    ///
    /// A [`JourneyKind::Child`] is cancelled with this journey and inherits
    /// its deadline. A [`JourneyKind::Root`] gets a fresh, deadline-free scope
    /// and can outlive this journey.
    ///
    /// # Panics
    ///
    /// Panics if the owner has been dropped.
    #[must_use]
    pub fn branch_off(&self, kind: JourneyKind) -> Self {
        self.trace_branch();
        let scope = match kind {
            JourneyKind::Root => Scope::new(),
            JourneyKind::Child => self.inner.scope.child(),
        };
        self.derive(kind, scope)
    }

    /// Child branch expiring at `deadline` or at this journey's deadline,
    /// whichever comes first.
    ///
    /// # Panics
    ///
    /// Panics if the owner has been dropped.
    #[must_use]
    pub fn branch_off_with_deadline(&self, deadline: Instant) -> Self {
        self.trace_branch();
        let scope = self.inner.scope.child_with_deadline(deadline);
        self.derive(JourneyKind::Child, scope)
    }

    /// Child branch expiring after `timeout`, capped by this journey's
    /// deadline. A timeout too large to be represented behaves like
    /// `branch_off(JourneyKind::Child)`.
    ///
    /// # Panics
    ///
    /// Panics if the owner has been dropped.
    #[must_use]
    pub fn branch_off_with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.branch_off_with_deadline(deadline),
            None => self.branch_off(JourneyKind::Child),
        }
    }

    fn trace_branch(&self) {
        self.trace(
            "ctx.journey.branch_off",
            "New sub context",
            &[Field::string("id", self.id())],
        );
    }

    fn derive(&self, kind: JourneyKind, scope: Scope) -> Self {
        Self {
            inner: Arc::new(Node {
                kind,
                id: Arc::clone(&self.inner.id),
                scope,
                stepper: self.inner.stepper.branch_off(),
                app: Weak::clone(&self.inner.app),
                logger: Arc::clone(&self.inner.logger),
            }),
        }
    }

    /// Run `f` in the background on a detached [`JourneyKind::Root`] branch.
    ///
    /// The branch is ended once `f` returns (or unwinds) unless it already
    /// reached a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`JourneyError::DispatchRejected`] when the owner's dispatcher
    /// refuses the task. `f` is then dropped without running.
    ///
    /// # Panics
    ///
    /// Panics if the owner has been dropped.
    pub fn bg<F>(&self, f: F) -> Result<(), JourneyError>
    where
        F: FnOnce(Self) + Send + 'static,
    {
        let child = self.branch_off(JourneyKind::Root);
        let dispatcher = self.app().dispatcher();

        dispatcher.dispatch(Task::named("journey.bg", move || {
            let guard = EndGuard(child);
            f(guard.0.clone());
        }))?;
        Ok(())
    }

    /// Ask the work carried by this journey to stop.
    ///
    /// Does not wait for the work to stop. Returns `true` only for the call
    /// that performed the transition; later calls do nothing.
    pub fn cancel(&self) -> bool {
        self.trace("ctx.journey.cancel", "Cancelling the operation", &[]);
        self.inner.scope.cancel()
    }

    /// Mark the journey as complete. Same effect as [`cancel`](Self::cancel).
    pub fn end(&self) -> bool {
        self.trace("ctx.journey.end", "End of this context", &[]);
        self.inner.scope.cancel()
    }

    /// Done signal.
    #[must_use]
    pub fn done(&self) -> Done {
        self.inner.scope.done()
    }

    /// `None` while active, then `Cancelled` or `DeadlineExceeded`.
    #[must_use]
    pub fn err(&self) -> Option<CancelError> {
        self.inner.scope.err()
    }

    /// Absolute deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.scope.deadline()
    }

    /// Look up a request-scoped value. Every lookup is traced.
    ///
    /// # Panics
    ///
    /// Panics if the owner has been dropped.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<Value> {
        self.trace("ctx.journey.value", "Lookup context value", &[Field::string("key", key)]);
        self.inner.scope.value(key)
    }

    /// Typed [`value`](Self::value) lookup.
    ///
    /// # Panics
    ///
    /// Panics if the owner has been dropped.
    #[must_use]
    pub fn value_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.value(key).and_then(|value| value.downcast::<T>().ok())
    }

    /// Bind a request-scoped value on this node. Child branches see it.
    pub fn set_value<T: Any + Send + Sync>(&self, key: &'static str, value: T) {
        self.inner.scope.set_value(key, Arc::new(value));
    }

    /// Emit a trace line annotated with this journey's identity and step.
    ///
    /// # Panics
    ///
    /// Panics if the owner has been dropped.
    pub fn trace(&self, tag: &str, message: &str, fields: &[Field]) {
        self.emit(Level::Trace, tag, message, fields);
    }

    /// Emit a warning line annotated with this journey's identity and step.
    ///
    /// # Panics
    ///
    /// Panics if the owner has been dropped.
    pub fn warning(&self, tag: &str, message: &str, fields: &[Field]) {
        self.emit(Level::Warning, tag, message, fields);
    }

    /// Emit an error line annotated with this journey's identity and step.
    ///
    /// # Panics
    ///
    /// Panics if the owner has been dropped.
    pub fn error(&self, tag: &str, message: &str, fields: &[Field]) {
        self.emit(Level::Error, tag, message, fields);
    }

    fn emit(&self, level: Level, tag: &str, message: &str, fields: &[Field]) {
        let app = self.app();
        let stats = app.stats();
        stats.histogram("log", 1.0, &tags([("tag", tag)]));

        self.inner.stepper.inc();
        self.inner
            .logger
            .log(level, tag, message, &self.log_fields(fields));

        let config = app.config();
        stats.histogram(
            "log.level",
            1.0,
            &tags([
                ("level", level.as_str()),
                ("tag", tag),
                ("service", config.service.as_str()),
                ("node", config.node.as_str()),
                ("version", config.version.as_str()),
            ]),
        );
    }

    fn log_fields(&self, fields: &[Field]) -> Vec<Field> {
        let mut all = Vec::with_capacity(fields.len() + 3);
        all.push(Field::string("log_type", "J"));
        all.push(Field::string("id", self.short_id()));
        all.push(Field::string("step", self.step()));
        all.extend_from_slice(fields);
        all
    }
}

impl Cancellable for Journey {
    fn deadline(&self) -> Option<Instant> {
        Self::deadline(self)
    }

    fn done(&self) -> Done {
        Self::done(self)
    }

    fn err(&self) -> Option<CancelError> {
        Self::err(self)
    }

    fn value(&self, key: &str) -> Option<Value> {
        Self::value(self, key)
    }
}

impl fmt::Debug for Journey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Journey")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("step", &self.step())
            .field("scope", &self.inner.scope)
            .finish_non_exhaustive()
    }
}

/// Ends a background journey on drop unless it is already done, so the
/// branch never stays active after its work returned or unwound.
///
/// Must not panic: once the owner is gone the scope is cancelled without
/// the `ctx.journey.end` trace.
struct EndGuard(Journey);

impl Drop for EndGuard {
    fn drop(&mut self) {
        if self.0.done().is_ready() {
            return;
        }
        match self.0.inner.app.upgrade() {
            Some(_owner) => {
                self.0.end();
            },
            None => {
                self.0.inner.scope.cancel();
            },
        }
    }
}
