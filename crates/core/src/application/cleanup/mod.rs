// Cleanup - scheduled sweepers for job records and run locks

mod strategies;

pub use strategies::{ClearDeadLocks, DeleteSkippedJobs, KeepLastJobs, StopDeadJobs};

use crate::application::worker::ShutdownToken;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// One maintenance pass over the stores.
///
/// Implementations tolerate per-record failures and report how many
/// records or locks they changed.
#[async_trait]
pub trait CleanupStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn clean_up(&self) -> Result<usize>;
}

/// Cleanup scheduler
///
/// Runs every strategy periodically in the background
pub struct CleanupScheduler {
    strategies: Vec<Arc<dyn CleanupStrategy>>,
    interval: Duration,
}

impl CleanupScheduler {
    /// Create a new cleanup scheduler
    ///
    /// # Arguments
    /// * `strategies` - Sweepers, run in order
    /// * `interval` - How often to run them
    pub fn new(strategies: Vec<Arc<dyn CleanupStrategy>>, interval: Duration) -> Self {
        Self {
            strategies,
            interval,
        }
    }

    /// Run cleanup loop until shutdown (background task)
    ///
    /// The first pass runs one interval after start.
    /// Should be spawned in tokio::spawn
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            strategies = ?self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "Cleanup scheduler started"
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately once
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.run_now().await;
                }
                _ = shutdown.wait() => {
                    info!("Cleanup scheduler stopped");
                    break;
                }
            }
        }
    }

    /// Run every strategy once; a failing strategy does not stop the others
    pub async fn run_now(&self) -> usize {
        let mut total = 0;
        for strategy in &self.strategies {
            match strategy.clean_up().await {
                Ok(changed) => {
                    if changed > 0 {
                        info!(strategy = strategy.name(), changed, "Cleanup completed");
                    }
                    total += changed;
                }
                Err(e) => {
                    error!(strategy = strategy.name(), error = %e, "Cleanup failed");
                }
            }
        }
        total
    }
}
