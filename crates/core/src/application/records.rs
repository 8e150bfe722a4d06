// Job Record Bookkeeping - mutations applied to persisted job records

use crate::application::lock::JobLockService;
use crate::domain::{JobMessage, JobStatus, MessageLevel};
use crate::error::Result;
use crate::port::{JobRecordStore, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEAD_JOB_MESSAGE: &str = "Job didn't receive updates for a while, considering it dead";
pub const SKIPPED_JOB_MESSAGE: &str = "Skipped job ..";
pub const RESTARTED_JOB_MESSAGE: &str = "Restarting job ..";

/// Applies lifecycle changes to job records and keeps run locks consistent
/// with them. Shared by the persistence listener, the job service and the
/// sweepers.
pub struct JobRecordService {
    record_store: Arc<dyn JobRecordStore>,
    lock_service: Arc<JobLockService>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobRecordService {
    pub fn new(
        record_store: Arc<dyn JobRecordStore>,
        lock_service: Arc<JobLockService>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            record_store,
            lock_service,
            time_provider,
        }
    }

    pub fn record_store(&self) -> Arc<dyn JobRecordStore> {
        Arc::clone(&self.record_store)
    }

    pub fn lock_service(&self) -> Arc<JobLockService> {
        Arc::clone(&self.lock_service)
    }

    pub fn now_millis(&self) -> i64 {
        self.time_provider.now_millis()
    }

    /// Stop a running job and release the run lock of its type.
    /// Records that are already stopped are left alone.
    pub async fn stop_job(&self, job_id: &str) -> Result<()> {
        let Some(mut record) = self.record_store.find_one(job_id).await? else {
            warn!(job_id, "Cannot stop unknown job");
            return Ok(());
        };
        if record.is_stopped() {
            debug!(job_id, "Job already stopped");
            return Ok(());
        }

        self.lock_service.release_run_lock(&record.job_type).await?;
        record.stop(self.time_provider.now_millis())?;
        self.record_store.create_or_update(&record).await?;
        info!(job_id, job_type = %record.job_type, status = %record.status, "Job stopped");
        Ok(())
    }

    /// Force-stop a job as DEAD and release the run lock of its type
    pub async fn kill_job(&self, job_id: &str) -> Result<()> {
        let Some(mut record) = self.record_store.find_one(job_id).await? else {
            warn!(job_id, "Cannot kill unknown job");
            return Ok(());
        };
        if record.is_stopped() {
            debug!(job_id, "Job already stopped, not marking dead");
            return Ok(());
        }

        let now = self.time_provider.now_millis();
        self.lock_service.release_run_lock(&record.job_type).await?;
        record.mark_dead(now);
        self.record_store.create_or_update(&record).await?;
        self.record_store
            .append_message(job_id, &JobMessage::warning(DEAD_JOB_MESSAGE, now))
            .await?;
        warn!(job_id, job_type = %record.job_type, "Job marked dead");
        Ok(())
    }

    /// Kill every running job without updates for `timeout`, then clear
    /// locks that no longer belong to a running job. Returns the number of
    /// killed jobs; one failing record does not abort the others.
    pub async fn kill_jobs_dead_since(&self, timeout: Duration) -> Result<usize> {
        let cutoff = self.time_provider.now_millis() - timeout.as_millis() as i64;
        let dead_jobs = self
            .record_store
            .find_running_without_update_since(cutoff)
            .await?;

        let mut killed = 0;
        for record in dead_jobs {
            match self.kill_job(&record.id).await {
                Ok(()) => killed += 1,
                Err(e) => error!(job_id = %record.id, error = %e, "Failed to kill dead job"),
            }
        }

        self.clear_dead_locks().await?;
        Ok(killed)
    }

    /// Release run locks whose job record is missing or already stopped
    pub async fn clear_dead_locks(&self) -> Result<usize> {
        let mut cleared = 0;
        for running in self.lock_service.running_jobs().await? {
            let stale = match self.record_store.find_one(&running.job_id).await {
                Ok(Some(record)) => record.is_stopped(),
                Ok(None) => true,
                Err(e) => {
                    error!(job_id = %running.job_id, error = %e, "Failed to load locked job");
                    continue;
                }
            };
            if !stale {
                continue;
            }
            match self.lock_service.release_run_lock(&running.job_type).await {
                Ok(()) => {
                    warn!(
                        job_id = %running.job_id,
                        job_type = %running.job_type,
                        "Cleared lock of job that is no longer running"
                    );
                    cleared += 1;
                }
                Err(e) => error!(job_type = %running.job_type, error = %e, "Failed to clear lock"),
            }
        }
        Ok(cleared)
    }

    pub async fn keep_alive(&self, job_id: &str) -> Result<()> {
        self.record_store
            .set_last_updated(job_id, self.time_provider.now_millis())
            .await
    }

    pub async fn mark_skipped(&self, job_id: &str) -> Result<()> {
        let now = self.time_provider.now_millis();
        self.record_store
            .append_message(job_id, &JobMessage::info(SKIPPED_JOB_MESSAGE, now))
            .await?;
        self.record_store.set_last_updated(job_id, now).await?;
        self.record_store.set_status(job_id, JobStatus::Skipped).await
    }

    pub async fn mark_restarted(&self, job_id: &str) -> Result<()> {
        let now = self.time_provider.now_millis();
        self.record_store
            .append_message(job_id, &JobMessage::warning(RESTARTED_JOB_MESSAGE, now))
            .await?;
        self.record_store.set_last_updated(job_id, now).await?;
        self.record_store.set_status(job_id, JobStatus::Ok).await
    }

    /// Append a message; an ERROR message also flags the job as ERROR
    pub async fn append_message(&self, job_id: &str, message: &JobMessage) -> Result<()> {
        self.record_store.append_message(job_id, message).await?;
        if message.level == MessageLevel::Error {
            self.record_store.set_status(job_id, JobStatus::Error).await?;
            self.record_store
                .set_last_updated(job_id, self.time_provider.now_millis())
                .await?;
        }
        Ok(())
    }
}
