// Cleanup strategies

use super::CleanupStrategy;
use crate::application::records::JobRecordService;
use crate::domain::{JobRecord, JobStatus};
use crate::error::Result;
use crate::port::job_record_store::sort_by_started_desc;
use crate::port::JobRecordStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Group by job type, each group newest first
fn by_type_newest_first(records: Vec<JobRecord>) -> BTreeMap<String, Vec<JobRecord>> {
    let mut groups: BTreeMap<String, Vec<JobRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.job_type.clone()).or_default().push(record);
    }
    for group in groups.values_mut() {
        sort_by_started_desc(group);
    }
    groups
}

async fn remove_all(store: &dyn JobRecordStore, records: Vec<JobRecord>) -> usize {
    let mut removed = 0;
    for record in records {
        match store.remove_if_stopped(&record.id).await {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => error!(job_id = %record.id, error = %e, "Failed to remove job record"),
        }
    }
    removed
}

/// Keeps the newest N stopped records per job type, plus the newest OK
/// record even if it is older. Running records are never removed.
pub struct KeepLastJobs {
    record_store: Arc<dyn JobRecordStore>,
    number_of_jobs_to_keep: usize,
}

impl KeepLastJobs {
    pub fn new(record_store: Arc<dyn JobRecordStore>, number_of_jobs_to_keep: usize) -> Self {
        info!(number_of_jobs_to_keep, "KeepLastJobs configured");
        Self {
            record_store,
            number_of_jobs_to_keep,
        }
    }

    fn jobs_to_delete(&self, records: Vec<JobRecord>) -> Vec<JobRecord> {
        let mut to_delete = Vec::new();
        for (_, group) in by_type_newest_first(records) {
            let stopped: Vec<JobRecord> = group.into_iter().filter(JobRecord::is_stopped).collect();
            let last_ok = stopped
                .iter()
                .find(|r| r.status == JobStatus::Ok)
                .map(|r| r.id.clone());
            to_delete.extend(
                stopped
                    .into_iter()
                    .skip(self.number_of_jobs_to_keep)
                    .filter(|r| Some(&r.id) != last_ok.as_ref()),
            );
        }
        to_delete
    }
}

#[async_trait]
impl CleanupStrategy for KeepLastJobs {
    fn name(&self) -> &'static str {
        "KeepLastJobs"
    }

    async fn clean_up(&self) -> Result<usize> {
        let records = self.record_store.find_all_without_messages().await?;
        let to_delete = self.jobs_to_delete(records);
        debug!(candidates = to_delete.len(), "KeepLastJobs sweep");
        Ok(remove_all(self.record_store.as_ref(), to_delete).await)
    }
}

/// Keeps only the newest N stopped SKIPPED records per job type
pub struct DeleteSkippedJobs {
    record_store: Arc<dyn JobRecordStore>,
    number_of_jobs_to_keep: usize,
}

impl DeleteSkippedJobs {
    pub fn new(record_store: Arc<dyn JobRecordStore>, number_of_jobs_to_keep: usize) -> Self {
        info!(number_of_jobs_to_keep, "DeleteSkippedJobs configured");
        Self {
            record_store,
            number_of_jobs_to_keep,
        }
    }

    fn jobs_to_delete(&self, records: Vec<JobRecord>) -> Vec<JobRecord> {
        by_type_newest_first(records)
            .into_values()
            .flat_map(|group| {
                group
                    .into_iter()
                    .filter(|r| r.is_stopped() && r.status == JobStatus::Skipped)
                    .skip(self.number_of_jobs_to_keep)
            })
            .collect()
    }
}

#[async_trait]
impl CleanupStrategy for DeleteSkippedJobs {
    fn name(&self) -> &'static str {
        "DeleteSkippedJobs"
    }

    async fn clean_up(&self) -> Result<usize> {
        let records = self.record_store.find_all_without_messages().await?;
        let to_delete = self.jobs_to_delete(records);
        Ok(remove_all(self.record_store.as_ref(), to_delete).await)
    }
}

/// Marks running jobs without updates for `mark_dead_after` as DEAD
pub struct StopDeadJobs {
    records: Arc<JobRecordService>,
    mark_dead_after: Duration,
}

impl StopDeadJobs {
    pub fn new(records: Arc<JobRecordService>, mark_dead_after: Duration) -> Self {
        info!(
            mark_dead_after_secs = mark_dead_after.as_secs(),
            "StopDeadJobs configured"
        );
        Self {
            records,
            mark_dead_after,
        }
    }
}

#[async_trait]
impl CleanupStrategy for StopDeadJobs {
    fn name(&self) -> &'static str {
        "StopDeadJobs"
    }

    async fn clean_up(&self) -> Result<usize> {
        self.records.kill_jobs_dead_since(self.mark_dead_after).await
    }
}

/// Releases run locks whose job is missing or already stopped
pub struct ClearDeadLocks {
    records: Arc<JobRecordService>,
}

impl ClearDeadLocks {
    pub fn new(records: Arc<JobRecordService>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl CleanupStrategy for ClearDeadLocks {
    fn name(&self) -> &'static str {
        "ClearDeadLocks"
    }

    async fn clean_up(&self) -> Result<usize> {
        self.records.clear_dead_locks().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::lock::JobLockService;
    use crate::domain::JobMutexGroups;
    use crate::infrastructure::{InMemJobMetaStore, InMemJobRecordStore};
    use crate::port::time_provider::mocks::FixedTimeProvider;

    fn stopped(id: &str, job_type: &str, started: i64, status: JobStatus) -> JobRecord {
        let mut record = JobRecord::new(id, job_type, started, "host-a");
        record.status = status;
        record.stop(started + 10).unwrap();
        record
    }

    async fn store_with(records: &[JobRecord]) -> Arc<InMemJobRecordStore> {
        let store = Arc::new(InMemJobRecordStore::new());
        for record in records {
            store.create_or_update(record).await.unwrap();
        }
        store
    }

    async fn remaining_ids(store: &InMemJobRecordStore) -> Vec<String> {
        store
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    #[tokio::test]
    async fn test_keep_last_jobs_keeps_newest_stopped() {
        let store = store_with(&[
            stopped("a", "IMPORT", 1_000, JobStatus::Ok),
            stopped("b", "IMPORT", 2_000, JobStatus::Ok),
            stopped("c", "IMPORT", 3_000, JobStatus::Ok),
            stopped("d", "IMPORT", 4_000, JobStatus::Ok),
            JobRecord::new("running", "IMPORT", 500, "host-a"),
            stopped("x", "EXPORT", 1_000, JobStatus::Ok),
        ])
        .await;

        let removed = KeepLastJobs::new(store.clone(), 2).clean_up().await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(remaining_ids(&store).await, vec!["d", "c", "x", "running"]);
    }

    #[tokio::test]
    async fn test_keep_last_jobs_preserves_last_ok() {
        let store = store_with(&[
            stopped("ok", "IMPORT", 1_000, JobStatus::Ok),
            stopped("e1", "IMPORT", 2_000, JobStatus::Error),
            stopped("e2", "IMPORT", 3_000, JobStatus::Dead),
            stopped("e3", "IMPORT", 4_000, JobStatus::Error),
        ])
        .await;

        KeepLastJobs::new(store.clone(), 2).clean_up().await.unwrap();

        assert_eq!(remaining_ids(&store).await, vec!["e3", "e2", "ok"]);
    }

    #[tokio::test]
    async fn test_delete_skipped_jobs() {
        let store = store_with(&[
            stopped("s1", "IMPORT", 1_000, JobStatus::Skipped),
            stopped("s2", "IMPORT", 2_000, JobStatus::Skipped),
            stopped("s3", "IMPORT", 3_000, JobStatus::Skipped),
            stopped("ok", "IMPORT", 500, JobStatus::Ok),
        ])
        .await;

        let removed = DeleteSkippedJobs::new(store.clone(), 1).clean_up().await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(remaining_ids(&store).await, vec!["s3", "ok"]);
    }

    #[tokio::test]
    async fn test_stop_dead_jobs_and_clear_locks() {
        let store = Arc::new(InMemJobRecordStore::new());
        let locks = Arc::new(JobLockService::new(
            Arc::new(InMemJobMetaStore::new()),
            JobMutexGroups::default(),
        ));
        let time = Arc::new(FixedTimeProvider::new(100_000));
        let records = Arc::new(JobRecordService::new(store.clone(), locks.clone(), time));

        locks.acquire_run_lock("dead", "IMPORT").await.unwrap();
        store
            .create_or_update(&JobRecord::new("dead", "IMPORT", 1_000, "host-a"))
            .await
            .unwrap();
        locks.acquire_run_lock("ghost", "EXPORT").await.unwrap();

        let killed = StopDeadJobs::new(records.clone(), Duration::from_secs(30))
            .clean_up()
            .await
            .unwrap();
        assert_eq!(killed, 1);
        assert_eq!(
            store.find_one("dead").await.unwrap().unwrap().status,
            JobStatus::Dead
        );
        // StopDeadJobs already cleared both locks
        assert_eq!(ClearDeadLocks::new(records).clean_up().await.unwrap(), 0);
        assert!(locks.running_jobs().await.unwrap().is_empty());
    }
}
