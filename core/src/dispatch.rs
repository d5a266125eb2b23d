//! Background dispatch contract.

use crate::error::DispatchError;
use std::fmt;

/// A unit of background work.
pub struct Task {
    name: &'static str,
    work: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    /// Wrap a closure.
    pub fn new(work: impl FnOnce() + Send + 'static) -> Self {
        Self::named("task", work)
    }

    /// Wrap a closure under a name used in logs and metrics.
    pub fn named(name: &'static str, work: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name,
            work: Box::new(work),
        }
    }

    /// Task name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Run the task on the current thread.
    pub fn run(self) {
        (self.work)();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Executes tasks outside the caller's thread of execution.
///
/// Submission must not block indefinitely. A rejected task is dropped without
/// running; the error is reported to the submitter.
pub trait Dispatcher: Send + Sync {
    /// Submit a task.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] when the task is refused (saturated,
    /// draining, or implementation specific).
    fn dispatch(&self, task: Task) -> Result<(), DispatchError>;
}
