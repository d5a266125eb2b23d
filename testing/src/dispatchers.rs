//! Deterministic dispatchers
//!
//! - [`InlineDispatcher`]: runs the task on the submitting thread
//! - [`ThreadDispatcher`]: one OS thread per task, joinable from the test
//! - [`RejectingDispatcher`]: refuses every task

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only panics on a poisoned mutex

use journey_core::dispatch::{Dispatcher, Task};
use journey_core::error::DispatchError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Runs every task immediately, before `dispatch` returns.
#[derive(Debug, Default)]
pub struct InlineDispatcher {
    dispatched: AtomicUsize,
}

impl InlineDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks run so far.
    #[must_use]
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }
}

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, task: Task) -> Result<(), DispatchError> {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        task.run();
        Ok(())
    }
}

/// Runs every task on its own thread.
///
/// Call [`join_all`](Self::join_all) to wait for everything dispatched so far.
#[derive(Debug, Clone, Default)]
pub struct ThreadDispatcher {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ThreadDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for every dispatched task. Returns how many panicked.
    pub fn join_all(&self) -> usize {
        let handles: Vec<_> = self.handles.lock().unwrap().drain(..).collect();
        handles
            .into_iter()
            .map(JoinHandle::join)
            .filter(Result::is_err)
            .count()
    }
}

impl Dispatcher for ThreadDispatcher {
    fn dispatch(&self, task: Task) -> Result<(), DispatchError> {
        let handle = thread::Builder::new()
            .name(task.name().to_string())
            .spawn(move || task.run())
            .map_err(|e| DispatchError::Rejected(e.to_string()))?;
        self.handles.lock().unwrap().push(handle);
        Ok(())
    }
}

/// Refuses every task with a fixed error.
#[derive(Debug, Clone)]
pub struct RejectingDispatcher {
    error: DispatchError,
    attempts: Arc<AtomicUsize>,
}

impl RejectingDispatcher {
    /// Refuse with `error`.
    #[must_use]
    pub fn new(error: DispatchError) -> Self {
        Self {
            error,
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of refused submissions.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for RejectingDispatcher {
    fn default() -> Self {
        Self::new(DispatchError::Saturated)
    }
}

impl Dispatcher for RejectingDispatcher {
    fn dispatch(&self, _task: Task) -> Result<(), DispatchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}
