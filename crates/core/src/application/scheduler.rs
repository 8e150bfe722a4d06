// Trigger Scheduler - starts registered jobs on their cron or fixed-delay schedule

use crate::application::service::JobService;
use crate::application::worker::constants::TRIGGER_ERROR_BACKOFF;
use crate::application::worker::ShutdownToken;
use crate::domain::{JobDefinition, JobSchedule};
use crate::error::{AppError, Result};
use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One trigger loop per scheduled job type.
///
/// Manual jobs are never triggered. A trigger that finds the job running,
/// disabled or blocked is silently skipped until the next fire time.
pub struct JobTriggerScheduler {
    service: Arc<JobService>,
}

impl JobTriggerScheduler {
    pub fn new(service: Arc<JobService>) -> Self {
        Self { service }
    }

    /// Spawn the trigger loops; they end when `shutdown` fires
    pub fn spawn_all(&self, shutdown: ShutdownToken) -> Result<Vec<JoinHandle<()>>> {
        let mut handles = Vec::new();
        for definition in self.service.definitions() {
            let service = Arc::clone(&self.service);
            let shutdown = shutdown.clone();
            match definition.schedule.clone() {
                JobSchedule::FixedDelay(delay) => {
                    info!(job_type = %definition.job_type, delay_ms = delay.as_millis() as u64, "Scheduling job with fixed delay");
                    handles.push(tokio::spawn(run_fixed_delay(service, definition, delay, shutdown)));
                }
                JobSchedule::Cron(expression) => {
                    let schedule = cron::Schedule::from_str(&expression).map_err(|e| {
                        AppError::Config(format!(
                            "invalid cron expression '{}' for {}: {}",
                            expression, definition.job_type, e
                        ))
                    })?;
                    info!(job_type = %definition.job_type, cron = %expression, "Scheduling job with cron");
                    handles.push(tokio::spawn(run_cron(service, definition, schedule, shutdown)));
                }
                JobSchedule::Manual => {
                    debug!(job_type = %definition.job_type, "Manually triggered job, not scheduled");
                }
            }
        }
        Ok(handles)
    }
}

/// Start once; returns the pause to take before the next attempt
async fn trigger(service: &JobService, job_type: &str) -> Option<Duration> {
    match service.start_async_job(job_type).await {
        Ok(Some(job_id)) => {
            debug!(job_type, job_id = %job_id, "Triggered job");
            None
        }
        Ok(None) => None,
        Err(e) => {
            error!(job_type, error = %e, "Failed to trigger job");
            Some(TRIGGER_ERROR_BACKOFF)
        }
    }
}

/// Sleep, or return false if shutdown came first
async fn pause(duration: Duration, shutdown: &mut ShutdownToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown.wait() => false,
    }
}

async fn run_fixed_delay(
    service: Arc<JobService>,
    definition: JobDefinition,
    delay: Duration,
    mut shutdown: ShutdownToken,
) {
    while pause(delay, &mut shutdown).await {
        if let Some(backoff) = trigger(&service, &definition.job_type).await {
            if !pause(backoff, &mut shutdown).await {
                break;
            }
        }
    }
    debug!(job_type = %definition.job_type, "Fixed delay trigger stopped");
}

async fn run_cron(
    service: Arc<JobService>,
    definition: JobDefinition,
    schedule: cron::Schedule,
    mut shutdown: ShutdownToken,
) {
    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            warn!(job_type = %definition.job_type, "Cron schedule has no upcoming fire time");
            break;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        if !pause(wait, &mut shutdown).await {
            break;
        }
        if let Some(backoff) = trigger(&service, &definition.job_type).await {
            if !pause(backoff, &mut shutdown).await {
                break;
            }
        }
    }
    debug!(job_type = %definition.job_type, "Cron trigger stopped");
}
