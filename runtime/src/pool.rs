//! Tokio-backed background dispatcher.
//!
//! Tasks run on tokio's blocking thread pool so that journey work, which is
//! synchronous, never stalls the async workers. A semaphore bounds the number
//! of tasks in flight; submission never waits for a slot.

use crate::metrics::PoolMetrics;
use journey_core::config::BackgroundConfig;
use journey_core::dispatch::{Dispatcher, Task};
use journey_core::error::DispatchError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::Semaphore;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Bounded dispatcher running tasks with `spawn_blocking`.
#[derive(Debug)]
pub struct BackgroundPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    draining: AtomicBool,
    capacity: usize,
}

impl BackgroundPool {
    /// Pool on `handle` allowing at most `max_in_flight` concurrent tasks
    /// (at least one).
    #[must_use]
    pub fn new(handle: Handle, max_in_flight: usize) -> Self {
        let capacity = max_in_flight.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            handle,
            permits: Arc::new(Semaphore::new(capacity)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            draining: AtomicBool::new(false),
            capacity,
        }
    }

    /// Pool on the runtime of the calling context.
    ///
    /// # Errors
    ///
    /// Returns [`TryCurrentError`] when called outside a tokio runtime.
    pub fn current(config: &BackgroundConfig) -> Result<Self, TryCurrentError> {
        Ok(Self::new(Handle::try_current()?, config.max_in_flight))
    }

    /// Maximum concurrent tasks.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tasks accepted and not yet finished.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Whether [`drain`](Self::drain) has been called.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Stop accepting tasks and wait for in-flight ones to finish.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DrainTimeout`] with the number of tasks still
    /// running when `timeout` elapses first. Those tasks keep running.
    pub async fn drain(&self, timeout: Duration) -> Result<(), DispatchError> {
        tracing::info!(in_flight = self.in_flight(), "Draining background pool");
        self.draining.store(true, Ordering::SeqCst);

        let start = Instant::now();
        loop {
            let pending = self.in_flight();

            if pending == 0 {
                tracing::info!("Background pool drained");
                return Ok(());
            }

            if start.elapsed() >= timeout {
                tracing::error!(
                    in_flight = pending,
                    "Drain timeout: {} background tasks still running", pending
                );
                return Err(DispatchError::DrainTimeout(pending));
            }

            tracing::debug!(
                in_flight = pending,
                elapsed_ms = start.elapsed().as_millis(),
                "Waiting for background tasks to complete"
            );

            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }

    fn reject(task: &Task, error: DispatchError, reason: &'static str) -> DispatchError {
        PoolMetrics::record_rejected(task.name(), reason);
        tracing::warn!(task = task.name(), reason, "Background task rejected");
        error
    }
}

impl Dispatcher for BackgroundPool {
    fn dispatch(&self, task: Task) -> Result<(), DispatchError> {
        // Counted before the draining check so that `drain` cannot observe
        // zero while an accepted task is still being spawned.
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        if self.is_draining() {
            return Err(Self::reject(&task, DispatchError::Draining, "draining"));
        }

        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            return Err(Self::reject(&task, DispatchError::Saturated, "saturated"));
        };

        let name = task.name();
        PoolMetrics::record_dispatched(name);

        self.handle.spawn_blocking(move || {
            let _guard = guard;
            let _permit = permit;
            let _released = ReleaseGuard;

            let start = Instant::now();
            task.run();
            PoolMetrics::record_completed(name, start.elapsed());
        });
        Ok(())
    }
}

/// Decrements the in-flight count on drop, even if the task panics.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct ReleaseGuard;

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        PoolMetrics::record_released();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::mpsc;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runs_tasks() {
        let pool = BackgroundPool::new(Handle::current(), 4);
        let (tx, rx) = mpsc::channel();

        for i in 0..4 {
            let tx = tx.clone();
            pool.dispatch(Task::new(move || tx.send(i).unwrap())).unwrap();
        }
        pool.drain(Duration::from_secs(5)).await.unwrap();

        let mut seen: Vec<i32> = rx.try_iter().collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rejects_when_saturated() {
        let pool = BackgroundPool::new(Handle::current(), 1);
        let (release, wait) = mpsc::channel::<()>();

        pool.dispatch(Task::new(move || {
            let _ = wait.recv();
        }))
        .unwrap();

        assert_eq!(pool.dispatch(Task::new(|| {})), Err(DispatchError::Saturated));
        assert_eq!(pool.in_flight(), 1);

        release.send(()).unwrap();
        pool.drain(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rejects_while_draining() {
        let pool = BackgroundPool::new(Handle::current(), 2);
        pool.drain(Duration::from_millis(50)).await.unwrap();

        assert!(pool.is_draining());
        assert_eq!(pool.dispatch(Task::new(|| {})), Err(DispatchError::Draining));
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drain_times_out_with_running_tasks() {
        let pool = BackgroundPool::new(Handle::current(), 2);
        let (release, wait) = mpsc::channel::<()>();

        pool.dispatch(Task::new(move || {
            let _ = wait.recv();
        }))
        .unwrap();

        assert_eq!(
            pool.drain(Duration::from_millis(50)).await,
            Err(DispatchError::DrainTimeout(1))
        );

        release.send(()).unwrap();
        pool.drain(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_task_releases_its_slot() {
        let pool = BackgroundPool::new(Handle::current(), 1);

        #[allow(clippy::panic)]
        pool.dispatch(Task::new(|| panic!("boom"))).unwrap();
        pool.drain(Duration::from_secs(5)).await.unwrap();

        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.permits.available_permits(), 1);
    }

    #[test]
    fn test_capacity_is_at_least_one() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let pool = BackgroundPool::new(rt.handle().clone(), 0);
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn test_current_outside_runtime_fails() {
        assert!(BackgroundPool::current(&BackgroundConfig::default()).is_err());
    }
}
