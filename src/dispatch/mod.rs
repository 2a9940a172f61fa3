//! Async dispatcher for relay tasks.
//!
//! Every accepted event becomes one independently scheduled task. The
//! dispatcher tracks all in-flight tasks so shutdown can wait for them, and
//! gates task execution behind a semaphore so the number of concurrently
//! executing outbound calls stays bounded while new arrivals are always
//! admitted immediately.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::{Semaphore, watch};
use tracing::{Instrument, error, instrument};

use crate::base::types::Void;

/// Tracks and runs the in-flight relay tasks.
///
/// Trivially cloneable; all clones share the same in-flight set and limiter.
#[derive(Clone)]
pub struct Dispatcher {
    in_flight: Arc<watch::Sender<usize>>,
    limiter: Arc<Semaphore>,
}

impl Dispatcher {
    /// Create a dispatcher that runs at most `max_concurrent` tasks at once.
    pub fn new(max_concurrent: usize) -> Self {
        let (in_flight, _) = watch::channel(0);

        Self {
            in_flight: Arc::new(in_flight),
            limiter: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Number of tasks currently registered in the in-flight set.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Register `task` in the in-flight set and start it.
    ///
    /// Returns immediately; completion order across tasks is unconstrained.
    /// The task is registered before it can reach any I/O, and deregisters
    /// exactly once on any exit path. Failures are logged here and never
    /// propagate to the caller.
    #[instrument(skip_all)]
    pub fn dispatch<F>(&self, task: F)
    where
        F: Future<Output = Void> + Send + 'static,
    {
        let guard = InFlightGuard::register(self.in_flight.clone());
        let limiter = self.limiter.clone();

        tokio::spawn(
            async move {
                let _guard = guard;

                // The limiter is never closed, so acquisition only fails if
                // the dispatcher itself is torn down mid-flight.
                let Ok(_permit) = limiter.acquire_owned().await else {
                    return;
                };

                // Process the task.
                let result = task.await;

                // Log any errors.
                if let Err(err) = &result {
                    error!("Error while handling: {}", err);
                }
            }
            .in_current_span(),
        );
    }

    /// Wait until the in-flight set is empty or `timeout` elapses.
    ///
    /// Returns `true` when the set drained in time. This is a cooperative
    /// wait, not a cancellation: tasks still running at the deadline are
    /// abandoned to finish (or not) on their own.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let mut empty = self.in_flight.subscribe();

        matches!(
            tokio::time::timeout(timeout, empty.wait_for(|count| *count == 0)).await,
            Ok(Ok(_))
        )
    }
}

/// Deregisters a task from the in-flight set when dropped.
///
/// Tied to the task future's lifetime, so deregistration happens exactly once
/// whether the task succeeds, fails, or panics.
struct InFlightGuard {
    counter: Arc<watch::Sender<usize>>,
}

impl InFlightGuard {
    fn register(counter: Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|count| *count += 1);
        Self { counter }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.send_modify(|count| *count -= 1);
    }
}
