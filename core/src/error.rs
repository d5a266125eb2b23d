//! Error taxonomy shared by every journey crate.
//!
//! All of these are terminal: nothing in the journey core retries on its own.

use thiserror::Error;

/// Why a scope left the active state.
///
/// Returned by [`Cancellable::err`](crate::scope::Cancellable::err) once the
/// done signal is ready. The value is stable for the lifetime of the scope.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelError {
    /// `cancel()` or `end()` was called on the scope or one of its ancestors.
    #[error("context canceled")]
    Cancelled,

    /// The scope's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Errors reported by a background [`Dispatcher`](crate::dispatch::Dispatcher).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Every worker slot is taken.
    #[error("background dispatcher is saturated")]
    Saturated,

    /// The dispatcher is draining and no longer accepts work.
    #[error("background dispatcher is draining")]
    Draining,

    /// Draining timed out with tasks still running.
    #[error("drain timed out with {0} tasks still running")]
    DrainTimeout(usize),

    /// Implementation-specific refusal.
    #[error("task rejected: {0}")]
    Rejected(String),
}

/// Errors surfaced by journey operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JourneyError {
    /// The journey was cancelled or ended.
    #[error("journey cancelled")]
    Cancelled,

    /// The journey deadline passed.
    #[error("journey deadline exceeded")]
    DeadlineExceeded,

    /// Background work could not be submitted.
    #[error("background dispatch rejected: {0}")]
    DispatchRejected(#[from] DispatchError),
}

impl From<CancelError> for JourneyError {
    fn from(err: CancelError) -> Self {
        match err {
            CancelError::Cancelled => Self::Cancelled,
            CancelError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Convenience alias for journey results.
pub type Result<T> = std::result::Result<T, JourneyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_error_converts() {
        assert_eq!(JourneyError::from(CancelError::Cancelled), JourneyError::Cancelled);
        assert_eq!(
            JourneyError::from(CancelError::DeadlineExceeded),
            JourneyError::DeadlineExceeded
        );
    }

    #[test]
    fn test_dispatch_error_display() {
        let err = JourneyError::from(DispatchError::Saturated);
        assert_eq!(
            err.to_string(),
            "background dispatch rejected: background dispatcher is saturated"
        );
    }
}
