// Worker Pool - bounded asynchronous execution of job bodies

pub mod constants;
mod panic_guard;
mod shutdown;

pub use panic_guard::{panic_message, spawn_guarded, PanicGuardResult};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runs submitted tasks on the tokio runtime, at most `size` at a time.
///
/// Submission never waits: a task that finds no free permit waits for one
/// on its own task, so callers return immediately.
pub struct WorkerPool {
    size: usize,
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            permits: Arc::new(Semaphore::new(size)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Submitted tasks that have not finished yet (running or waiting)
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// True once `shutdown` was called; no further task will get a permit
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub fn submit<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.submit_or_else(task, async {
            warn!("Worker pool closed, dropping task");
        })
    }

    /// Like `submit`, but runs `rejected` instead of `task` when the pool
    /// closes before the task got a permit
    pub fn submit_or_else<F, R>(&self, task: F, rejected: R) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
        R: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let guard = InFlightGuard::new(Arc::clone(&self.in_flight), Arc::clone(&self.idle));

        tokio::spawn(async move {
            let _guard = guard;
            match permits.acquire_owned().await {
                Ok(_permit) => task.await,
                Err(_) => rejected.await,
            }
        })
    }

    /// Wait until every submitted task has finished
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Wait for running tasks up to `grace`; false if some are still running
    pub async fn shutdown(&self, grace: Duration) -> bool {
        debug!(in_flight = self.in_flight(), "Worker pool shutting down");
        self.permits.close();
        tokio::time::timeout(grace, self.wait_idle()).await.is_ok()
    }
}

/// Decrements the in-flight count when the task ends, panics included
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl InFlightGuard {
    fn new(in_flight: Arc<AtomicUsize>, idle: Arc<Notify>) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self { in_flight, idle }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}
