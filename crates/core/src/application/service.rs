// Job Service - entry point for starting and administering jobs

use crate::application::lock::JobLockService;
use crate::application::records::JobRecordService;
use crate::application::registry::JobRegistry;
use crate::application::runner::{JobRunner, RunOutcome};
use crate::application::worker::WorkerPool;
use crate::application::worker::constants::DEFAULT_HEARTBEAT_INTERVAL;
use crate::domain::{DisabledJob, JobDefinition, JobMessage, JobMeta, JobRecord, RunningJob};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobEventListener, JobMetrics, JobRecordStore, SystemInfo};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Recorded on a job that was admitted but never got a worker
pub const NOT_EXECUTED_MESSAGE: &str = "Job was not executed, worker pool is shut down";

/// Collaborators of the job service
pub struct JobServiceDeps {
    pub registry: JobRegistry,
    pub records: Arc<JobRecordService>,
    pub events: Arc<dyn JobEventListener>,
    pub metrics: Arc<dyn JobMetrics>,
    pub id_provider: Arc<dyn IdProvider>,
    pub system_info: Arc<dyn SystemInfo>,
}

/// Orchestrates job starts: resolves the runnable, takes the run lock,
/// creates the record and hands execution to the worker pool.
pub struct JobService {
    registry: JobRegistry,
    records: Arc<JobRecordService>,
    record_store: Arc<dyn JobRecordStore>,
    lock_service: Arc<JobLockService>,
    events: Arc<dyn JobEventListener>,
    metrics: Arc<dyn JobMetrics>,
    id_provider: Arc<dyn IdProvider>,
    system_info: Arc<dyn SystemInfo>,
    pool: WorkerPool,
    heartbeat_interval: Duration,
}

impl JobService {
    pub fn new(deps: JobServiceDeps, thread_count: usize) -> Self {
        info!(
            count = deps.registry.len(),
            job_types = ?deps.registry.job_types(),
            "Registered job runnables"
        );
        Self {
            registry: deps.registry,
            record_store: deps.records.record_store(),
            lock_service: deps.records.lock_service(),
            records: deps.records,
            events: deps.events,
            metrics: deps.metrics,
            id_provider: deps.id_provider,
            system_info: deps.system_info,
            pool: WorkerPool::new(thread_count),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn definitions(&self) -> Vec<JobDefinition> {
        self.registry.definitions()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Start a job of `job_type` in the background.
    ///
    /// Returns the new job id, or `None` if the job was not admitted
    /// (disabled, already running, blocked by a mutex type, or the service
    /// is shutting down). Unknown job types and repository failures are
    /// errors.
    ///
    /// The runner is started, and its heartbeat running, before the job
    /// waits for a worker, so a queued job is never swept as dead.
    pub async fn start_async_job(&self, job_type: &str) -> Result<Option<String>> {
        let runnable = self
            .registry
            .get(job_type)
            .ok_or_else(|| AppError::NotFound(format!("No job runnable for {}", job_type)))?;
        let job_type = runnable.definition().job_type.clone();

        if self.pool.is_closed() {
            warn!(job_type = %job_type, "Worker pool is shut down, job not started");
            return Ok(None);
        }

        if let Some(running_id) = self.lock_service.running_job(&job_type).await? {
            info!(job_type = %job_type, running_id = %running_id, "Job is already running");
            return Ok(None);
        }

        let job_id = self.id_provider.generate_id();
        match self.lock_service.acquire_run_lock(&job_id, &job_type).await {
            Ok(()) => {}
            Err(e) if e.is_blocked() => {
                info!(job_type = %job_type, reason = %e, "Job not started");
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        let record = JobRecord::new(
            &job_id,
            &job_type,
            self.records.now_millis(),
            self.system_info.hostname(),
        );
        if let Err(e) = self.record_store.create_or_update(&record).await {
            error!(job_id = %job_id, job_type = %job_type, error = %e, "Failed to create job record");
            self.lock_service.release_run_lock(&job_type).await?;
            return Err(e);
        }

        // heartbeat from admission on, also while waiting for a worker
        let runner = Arc::new(
            JobRunner::new(&job_id, runnable, Arc::clone(&self.events))
                .with_heartbeat_interval(self.heartbeat_interval),
        );
        if let Err(e) = runner.start().await {
            error!(job_id = %job_id, job_type = %job_type, error = %e, "Failed to start job runner");
            self.records.stop_job(&job_id).await?;
            return Err(e);
        }

        let queued = Arc::clone(&runner);
        let metrics = Arc::clone(&self.metrics);
        self.pool.submit_or_else(
            async move {
                let started = Instant::now();
                match runner.finish().await {
                    Ok(RunOutcome::Succeeded) => debug!(job_id = %runner.job_id(), "Job succeeded"),
                    Ok(outcome) => debug!(job_id = %runner.job_id(), outcome = ?outcome, "Job finished"),
                    Err(e) => error!(job_id = %runner.job_id(), error = %e, "Job runner failed"),
                }
                metrics.record_runtime(&job_type, started.elapsed());
            },
            async move {
                if let Err(e) = queued.abandon(NOT_EXECUTED_MESSAGE).await {
                    error!(job_id = %queued.job_id(), error = %e, "Failed to abandon job");
                }
            },
        );

        Ok(Some(job_id))
    }

    pub async fn find_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        self.record_store.find_one(job_id).await
    }

    /// Latest `count` jobs, optionally of one type
    pub async fn find_jobs(&self, job_type: Option<&str>, count: usize) -> Result<Vec<JobRecord>> {
        match job_type {
            Some(job_type) => self.record_store.find_latest_by_type(job_type, count).await,
            None => self.record_store.find_latest(count).await,
        }
    }

    /// Latest job of every type
    pub async fn find_jobs_distinct(&self) -> Result<Vec<JobRecord>> {
        self.record_store.find_latest_distinct().await
    }

    /// Delete stopped jobs, optionally of one type; running jobs are kept
    pub async fn delete_jobs(&self, job_type: Option<&str>) -> Result<usize> {
        let records = match job_type {
            Some(job_type) => self.record_store.find_by_type(job_type).await?,
            None => self.record_store.find_all_without_messages().await?,
        };
        let mut deleted = 0;
        for record in records.iter().filter(|r| r.is_stopped()) {
            if self.record_store.remove_if_stopped(&record.id).await? {
                deleted += 1;
            }
        }
        info!(job_type = ?job_type, deleted, "Deleted stopped jobs");
        Ok(deleted)
    }

    pub async fn stop_job(&self, job_id: &str) -> Result<()> {
        self.records.stop_job(job_id).await
    }

    pub async fn kill_job(&self, job_id: &str) -> Result<()> {
        self.records.kill_job(job_id).await
    }

    pub async fn kill_jobs_dead_since(&self, timeout: Duration) -> Result<usize> {
        self.records.kill_jobs_dead_since(timeout).await
    }

    pub async fn keep_alive(&self, job_id: &str) -> Result<()> {
        self.records.keep_alive(job_id).await
    }

    pub async fn mark_skipped(&self, job_id: &str) -> Result<()> {
        self.records.mark_skipped(job_id).await
    }

    pub async fn mark_restarted(&self, job_id: &str) -> Result<()> {
        self.records.mark_restarted(job_id).await
    }

    pub async fn append_message(&self, job_id: &str, message: &JobMessage) -> Result<()> {
        self.records.append_message(job_id, message).await
    }

    pub async fn disable_job_type(&self, job_type: &str, comment: Option<&str>) -> Result<()> {
        self.lock_service.disable(job_type, comment).await
    }

    pub async fn enable_job_type(&self, job_type: &str) -> Result<()> {
        self.lock_service.enable(job_type).await
    }

    pub async fn disabled_job_types(&self) -> Result<Vec<DisabledJob>> {
        self.lock_service.disabled_job_types().await
    }

    pub async fn running_jobs(&self) -> Result<Vec<RunningJob>> {
        self.lock_service.running_jobs().await
    }

    pub async fn job_meta(&self, job_type: &str) -> Result<JobMeta> {
        self.lock_service.job_meta(job_type).await
    }

    /// Wait for running jobs up to `grace`
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let finished = self.pool.shutdown(grace).await;
        if !finished {
            error!(in_flight = self.pool.in_flight(), "Jobs still running at shutdown");
        }
        finished
    }
}
