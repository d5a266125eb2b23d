//! Cancellation tree.
//!
//! A [`Scope`] is a one-shot, monotone cancellation signal with an optional
//! deadline. Child scopes are cancelled with their parent; a scope never
//! cancels its parent. The first transition out of [`ScopeState::Active`]
//! wins and is never reversed.
//!
//! Deadlines need no timer thread. Any observation made after the deadline
//! (`err`, `state`, `Done::is_ready`) performs the transition, and blocked
//! waiters wake up at the deadline on their own.
//!
//! # Example
//!
//! ```
//! use journey_core::scope::{Scope, ScopeState};
//! use journey_core::CancelError;
//!
//! let parent = Scope::new();
//! let child = parent.child();
//!
//! parent.cancel();
//!
//! assert!(child.done().is_ready());
//! assert_eq!(child.err(), Some(CancelError::Cancelled));
//! assert_eq!(parent.state(), ScopeState::Cancelled);
//! ```

use crate::error::CancelError;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Request-scoped value stored in a scope.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Capability shared by every cancellation-bearing type.
///
/// Handlers that only need to observe cancellation should accept
/// `&impl Cancellable` rather than a concrete journey type.
pub trait Cancellable {
    /// Absolute deadline, if any. Stable across calls.
    fn deadline(&self) -> Option<Instant>;

    /// Level-triggered signal that becomes ready once the scope is done.
    fn done(&self) -> Done;

    /// `None` while active, then the stable reason.
    fn err(&self) -> Option<CancelError>;

    /// Look up a request-scoped value. Unknown keys yield `None`.
    fn value(&self, key: &str) -> Option<Value>;
}

/// Lifecycle state of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeState {
    /// Not cancelled yet.
    Active,
    /// Cancelled explicitly (or through an ancestor).
    Cancelled,
    /// The deadline passed (here or in an ancestor).
    DeadlineExceeded,
}

impl ScopeState {
    /// Error classification of a terminal state.
    #[must_use]
    pub const fn err(self) -> Option<CancelError> {
        match self {
            Self::Active => None,
            Self::Cancelled => Some(CancelError::Cancelled),
            Self::DeadlineExceeded => Some(CancelError::DeadlineExceeded),
        }
    }

    /// Whether the state is terminal.
    #[must_use]
    pub const fn is_done(self) -> bool {
        !matches!(self, Self::Active)
    }
}

struct Signal {
    state: ScopeState,
    children: Vec<Weak<Inner>>,
}

struct Inner {
    deadline: Option<Instant>,
    // Only used to resolve values; cancellation flows through `children`.
    parent: Option<Arc<Inner>>,
    signal: Mutex<Signal>,
    ready: Condvar,
    notify: watch::Sender<bool>,
    values: RwLock<HashMap<&'static str, Value>>,
}

impl Inner {
    fn new(deadline: Option<Instant>, parent: Option<Arc<Inner>>, state: ScopeState) -> Self {
        let (notify, _) = watch::channel(state.is_done());
        Self {
            deadline,
            parent,
            signal: Mutex::new(Signal {
                state,
                children: Vec::new(),
            }),
            ready: Condvar::new(),
            notify,
            values: RwLock::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Signal> {
        self.signal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `state` if still active. Returns whether this call won.
    fn finish(&self, state: ScopeState) -> bool {
        let children = {
            let mut signal = self.lock();
            if signal.state.is_done() {
                return false;
            }
            signal.state = state;
            std::mem::take(&mut signal.children)
        };

        self.ready.notify_all();
        self.notify.send_replace(true);

        for child in children {
            if let Some(child) = child.upgrade() {
                child.finish(state);
            }
        }
        true
    }

    fn state(&self) -> ScopeState {
        let state = self.lock().state;
        if state.is_done() {
            return state;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.finish(ScopeState::DeadlineExceeded);
                self.lock().state
            },
            _ => state,
        }
    }

    /// Block until done or until `limit`. Returns whether the scope is done.
    fn wait_until(&self, limit: Option<Instant>) -> bool {
        let mut signal = self.lock();
        loop {
            if signal.state.is_done() {
                return true;
            }

            let wake_at = match (self.deadline, limit) {
                (Some(d), Some(l)) => Some(d.min(l)),
                (d, l) => d.or(l),
            };

            match wake_at {
                None => {
                    signal = self
                        .ready
                        .wait(signal)
                        .unwrap_or_else(PoisonError::into_inner);
                },
                Some(wake_at) => {
                    let now = Instant::now();
                    if now >= wake_at {
                        drop(signal);
                        return match self.deadline {
                            Some(deadline) if now >= deadline => {
                                self.finish(ScopeState::DeadlineExceeded);
                                true
                            },
                            _ => self.lock().state.is_done(),
                        };
                    }
                    signal = self
                        .ready
                        .wait_timeout(signal, wake_at - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                },
            }
        }
    }

    fn value(&self, key: &str) -> Option<Value> {
        let own = self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        match own {
            Some(value) => Some(value),
            None => self.parent.as_ref().and_then(|parent| parent.value(key)),
        }
    }
}

/// Node of the cancellation tree.
///
/// Cloning is cheap and yields a handle to the same scope.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<Inner>,
}

impl Scope {
    /// A manually cancellable scope with no deadline and no parent.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new(None, None, ScopeState::Active)),
        }
    }

    /// A parentless scope that expires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(Inner::new(Some(deadline), None, ScopeState::Active)),
        }
    }

    /// A parentless scope that expires after `timeout`.
    ///
    /// A timeout too large to be represented yields a scope without deadline.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::new(),
        }
    }

    /// Derive a child that inherits cancellation and the deadline verbatim.
    #[must_use]
    pub fn child(&self) -> Self {
        self.derive(self.inner.deadline)
    }

    /// Derive a child that expires at `deadline` or at the parent's deadline,
    /// whichever comes first.
    #[must_use]
    pub fn child_with_deadline(&self, deadline: Instant) -> Self {
        let effective = match self.inner.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        self.derive(Some(effective))
    }

    /// Derive a child that expires after `timeout`, capped by the parent's
    /// deadline. An unrepresentable timeout behaves like [`child`](Self::child).
    #[must_use]
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.child_with_deadline(deadline),
            None => self.child(),
        }
    }

    fn derive(&self, deadline: Option<Instant>) -> Self {
        let mut signal = self.inner.lock();
        let child = Arc::new(Inner::new(
            deadline,
            Some(Arc::clone(&self.inner)),
            signal.state,
        ));
        if !signal.state.is_done() {
            signal.children.retain(|c| c.strong_count() > 0);
            signal.children.push(Arc::downgrade(&child));
        }
        Self { inner: child }
    }

    /// Cancel this scope and every child derived from it.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn cancel(&self) -> bool {
        self.inner.finish(ScopeState::Cancelled)
    }

    /// Current state, applying the deadline if it has passed.
    #[must_use]
    pub fn state(&self) -> ScopeState {
        self.inner.state()
    }

    /// Absolute deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Done signal handle.
    #[must_use]
    pub fn done(&self) -> Done {
        Done {
            inner: Arc::clone(&self.inner),
        }
    }

    /// `None` while active, then the stable reason.
    #[must_use]
    pub fn err(&self) -> Option<CancelError> {
        self.state().err()
    }

    /// Look up `key` here, then in ancestors.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<Value> {
        self.inner.value(key)
    }

    /// Bind `value` under `key` on this scope. Children see it; the parent
    /// does not. Returns the value previously bound on this scope.
    pub fn set_value(&self, key: &'static str, value: Value) -> Option<Value> {
        self.inner
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellable for Scope {
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

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("state", &self.inner.lock().state)
            .field("deadline", &self.inner.deadline)
            .finish_non_exhaustive()
    }
}

/// Level-triggered done signal of a [`Scope`].
///
/// Once ready it stays ready. Any number of handles may observe it.
#[derive(Clone)]
pub struct Done {
    inner: Arc<Inner>,
}

impl Done {
    /// Non-blocking check.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.state().is_done()
    }

    /// Block the calling thread until ready.
    ///
    /// Never returns for a scope without deadline that is never cancelled.
    pub fn wait(&self) {
        self.inner.wait_until(None);
    }

    /// Block for at most `timeout`. Returns whether the signal is ready.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.inner.wait_until(Instant::now().checked_add(timeout))
    }

    /// Wait asynchronously until ready.
    pub async fn ready(&self) {
        let mut rx = self.inner.notify.subscribe();
        match self.inner.deadline {
            None => {
                let _ = rx.wait_for(|done| *done).await;
            },
            Some(deadline) => {
                tokio::select! {
                    _ = rx.wait_for(|done| *done) => {},
                    () = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                        self.inner.finish(ScopeState::DeadlineExceeded);
                    },
                }
            },
        }
    }

    /// Reason once ready.
    #[must_use]
    pub fn err(&self) -> Option<CancelError> {
        self.inner.state().err()
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("ready", &self.inner.lock().state.is_done())
            .finish()
    }
}
