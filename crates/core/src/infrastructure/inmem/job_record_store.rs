// In-memory Job Record Store

use crate::domain::{JobMessage, JobRecord, JobStatus};
use crate::error::{AppError, Result};
use crate::port::job_record_store::sort_by_started_desc;
use crate::port::JobRecordStore;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Records kept in a map keyed by job id
#[derive(Default)]
pub struct InMemJobRecordStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl InMemJobRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sorted<F>(&self, filter: F) -> Vec<JobRecord>
    where
        F: Fn(&JobRecord) -> bool,
    {
        let records = self.records.read().await;
        let mut result: Vec<JobRecord> = records.values().filter(|r| filter(r)).cloned().collect();
        sort_by_started_desc(&mut result);
        result
    }

    async fn update<F>(&self, id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("job record {}", id)))?;
        f(record);
        Ok(())
    }
}

#[async_trait]
impl JobRecordStore for InMemJobRecordStore {
    async fn create_or_update(&self, record: &JobRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find_one(&self, id: &str) -> Result<Option<JobRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<JobRecord>> {
        Ok(self.sorted(|_| true).await)
    }

    async fn find_by_type(&self, job_type: &str) -> Result<Vec<JobRecord>> {
        Ok(self.sorted(|r| r.job_type == job_type).await)
    }

    async fn find_latest(&self, max_count: usize) -> Result<Vec<JobRecord>> {
        let mut records = self.sorted(|_| true).await;
        records.truncate(max_count);
        Ok(records)
    }

    async fn find_latest_by_type(
        &self,
        job_type: &str,
        max_count: usize,
    ) -> Result<Vec<JobRecord>> {
        let mut records = self.sorted(|r| r.job_type == job_type).await;
        records.truncate(max_count);
        Ok(records)
    }

    async fn find_running_without_update_since(&self, timestamp: i64) -> Result<Vec<JobRecord>> {
        Ok(self
            .sorted(|r| r.is_running() && r.last_updated < timestamp)
            .await)
    }

    async fn append_message(&self, id: &str, message: &JobMessage) -> Result<()> {
        self.update(id, |record| {
            record.touch(message.timestamp);
            record.messages.push(message.clone());
        })
        .await
    }

    async fn set_status(&self, id: &str, status: JobStatus) -> Result<()> {
        self.update(id, |record| record.status = status).await
    }

    async fn set_last_updated(&self, id: &str, timestamp: i64) -> Result<()> {
        self.update(id, |record| record.touch(timestamp)).await
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn remove_if_stopped(&self, id: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.get(id) {
            Some(record) if record.is_stopped() => {
                records.remove(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.read().await.len() as u64)
    }

    async fn delete_all(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }
}
