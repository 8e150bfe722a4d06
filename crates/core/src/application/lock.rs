// Job Lock Service - run permits per job type

use crate::domain::{DisabledJob, JobMeta, JobMutexGroups, RunningJob};
use crate::error::{AppError, BlockReason, Result};
use crate::port::JobMetaStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Grants or denies run permits using the meta store's atomic
/// `create_value` and the configured mutex groups.
///
/// The running marker is created first and the other mutex types are
/// checked afterwards. Two mutually exclusive types racing through
/// `acquire_run_lock` can therefore both back off; callers that need
/// strict admission retry later.
pub struct JobLockService {
    meta_store: Arc<dyn JobMetaStore>,
    mutex_groups: JobMutexGroups,
}

impl JobLockService {
    pub fn new(meta_store: Arc<dyn JobMetaStore>, mutex_groups: JobMutexGroups) -> Self {
        Self {
            meta_store,
            mutex_groups,
        }
    }

    pub fn meta_store(&self) -> Arc<dyn JobMetaStore> {
        Arc::clone(&self.meta_store)
    }

    pub fn mutex_types_for(&self, job_type: &str) -> BTreeSet<String> {
        self.mutex_groups.mutex_types_for(job_type)
    }

    /// Acquire the run lock of `job_type` for `job_id`.
    ///
    /// Fails with `AppError::JobBlocked` if the type is disabled, already
    /// running, or a conflicting type is running. A rejection never leaves
    /// a running marker for `job_type` behind.
    pub async fn acquire_run_lock(&self, job_id: &str, job_type: &str) -> Result<()> {
        if self.is_disabled(job_type).await? {
            return Err(AppError::blocked(job_type, BlockReason::Disabled));
        }

        if !self.meta_store.set_running_job(job_type, job_id).await? {
            return Err(AppError::blocked(job_type, BlockReason::AlreadyRunning));
        }

        for other in self.mutex_types_for(job_type) {
            if other == job_type {
                continue;
            }
            let running = match self.meta_store.get_running_job(&other).await {
                Ok(running) => running,
                Err(e) => {
                    self.release_run_lock(job_type).await?;
                    return Err(e);
                }
            };
            if running.is_some() {
                debug!(job_type, blocked_by = %other, "Releasing run lock, mutex type is running");
                self.release_run_lock(job_type).await?;
                return Err(AppError::blocked(job_type, BlockReason::BlockedBy(other)));
            }
        }

        debug!(job_id, job_type, "Run lock acquired");
        Ok(())
    }

    /// Clear the running marker (no-op if absent)
    pub async fn release_run_lock(&self, job_type: &str) -> Result<()> {
        self.meta_store.clear_running_job(job_type).await?;
        debug!(job_type, "Run lock released");
        Ok(())
    }

    pub async fn running_job(&self, job_type: &str) -> Result<Option<String>> {
        self.meta_store.get_running_job(job_type).await
    }

    pub async fn is_disabled(&self, job_type: &str) -> Result<bool> {
        Ok(self.meta_store.get_job_meta(job_type).await?.disabled)
    }

    pub async fn disable(&self, job_type: &str, comment: Option<&str>) -> Result<()> {
        self.meta_store.disable(job_type, comment).await?;
        info!(job_type, comment = comment.unwrap_or(""), "Job type disabled");
        Ok(())
    }

    pub async fn enable(&self, job_type: &str) -> Result<()> {
        self.meta_store.enable(job_type).await?;
        info!(job_type, "Job type enabled");
        Ok(())
    }

    /// All job types whose running marker is set
    pub async fn running_jobs(&self) -> Result<Vec<RunningJob>> {
        let mut running = Vec::new();
        for job_type in self.meta_store.find_all_job_types().await? {
            match self.meta_store.get_running_job(&job_type).await {
                Ok(Some(job_id)) => running.push(RunningJob { job_id, job_type }),
                Ok(None) => {}
                Err(e) => warn!(job_type = %job_type, error = %e, "Failed to read running marker"),
            }
        }
        Ok(running)
    }

    pub async fn disabled_job_types(&self) -> Result<Vec<DisabledJob>> {
        let mut disabled = Vec::new();
        for job_type in self.meta_store.find_all_job_types().await? {
            let meta = self.meta_store.get_job_meta(&job_type).await?;
            if meta.disabled {
                disabled.push(DisabledJob {
                    job_type,
                    comment: meta.disabled_comment,
                });
            }
        }
        Ok(disabled)
    }

    pub async fn job_meta(&self, job_type: &str) -> Result<JobMeta> {
        self.meta_store.get_job_meta(job_type).await
    }
}
