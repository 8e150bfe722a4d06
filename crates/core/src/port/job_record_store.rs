// Job Record Store Port (Interface)

use crate::domain::{JobMessage, JobRecord, JobStatus};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// Repository interface for per-execution job records.
///
/// Listings are ordered by `started` descending. Single-field updates
/// (`append_message`, `set_status`, `set_last_updated`) fail with
/// `AppError::NotFound` for unknown ids.
#[async_trait]
pub trait JobRecordStore: Send + Sync {
    /// Insert or replace a record
    async fn create_or_update(&self, record: &JobRecord) -> Result<()>;

    /// Find record by ID
    async fn find_one(&self, id: &str) -> Result<Option<JobRecord>>;

    async fn find_all(&self) -> Result<Vec<JobRecord>>;

    async fn find_by_type(&self, job_type: &str) -> Result<Vec<JobRecord>>;

    /// Latest records across all types
    async fn find_latest(&self, max_count: usize) -> Result<Vec<JobRecord>>;

    /// Latest records of one type
    async fn find_latest_by_type(&self, job_type: &str, max_count: usize)
        -> Result<Vec<JobRecord>>;

    /// Records without `stopped` whose `last_updated` is before `timestamp`
    async fn find_running_without_update_since(&self, timestamp: i64) -> Result<Vec<JobRecord>>;

    async fn append_message(&self, id: &str, message: &JobMessage) -> Result<()>;

    async fn set_status(&self, id: &str, status: JobStatus) -> Result<()>;

    async fn set_last_updated(&self, id: &str, timestamp: i64) -> Result<()>;

    /// Remove unconditionally (no-op for unknown ids)
    async fn remove(&self, id: &str) -> Result<()>;

    /// Remove only if the record is stopped; returns whether it was removed
    async fn remove_if_stopped(&self, id: &str) -> Result<bool>;

    async fn count(&self) -> Result<u64>;

    async fn delete_all(&self) -> Result<()>;

    /// All records with empty message histories (cheap listing for sweepers)
    async fn find_all_without_messages(&self) -> Result<Vec<JobRecord>> {
        Ok(self
            .find_all()
            .await?
            .iter()
            .map(JobRecord::without_messages)
            .collect())
    }

    /// The latest record of every job type
    async fn find_latest_distinct(&self) -> Result<Vec<JobRecord>> {
        let mut seen = HashSet::new();
        Ok(self
            .find_all()
            .await?
            .into_iter()
            .filter(|record| seen.insert(record.job_type.clone()))
            .collect())
    }
}

/// Sort newest first, breaking ties by id so listings are stable
pub fn sort_by_started_desc(records: &mut [JobRecord]) {
    records.sort_by(|a, b| b.started.cmp(&a.started).then_with(|| b.id.cmp(&a.id)));
}
