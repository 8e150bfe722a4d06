// Job Meta Store Port (Interface)

use crate::domain::{JobMeta, KEY_DISABLED, KEY_RUNNING};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Per-job-type key/value control state.
///
/// `create_value` is the correctness-critical primitive: it must be a single
/// atomic "set iff absent" on the backend, because several service instances
/// may share the same store.
#[async_trait]
pub trait JobMetaStore: Send + Sync {
    async fn get_value(&self, job_type: &str, key: &str) -> Result<Option<String>>;

    /// Set (`Some`) or delete (`None`) a key; returns the previous value.
    /// The job type becomes known even if the key is deleted.
    async fn set_value(&self, job_type: &str, key: &str, value: Option<&str>)
        -> Result<Option<String>>;

    /// Atomically create a key; false if the key already exists
    async fn create_value(&self, job_type: &str, key: &str, value: &str) -> Result<bool>;

    async fn get_job_meta(&self, job_type: &str) -> Result<JobMeta>;

    /// All job types that have ever been written
    async fn find_all_job_types(&self) -> Result<BTreeSet<String>>;

    async fn delete_all(&self) -> Result<()>;

    async fn get_running_job(&self, job_type: &str) -> Result<Option<String>> {
        self.get_value(job_type, KEY_RUNNING).await
    }

    async fn set_running_job(&self, job_type: &str, job_id: &str) -> Result<bool> {
        self.create_value(job_type, KEY_RUNNING, job_id).await
    }

    /// Clearing an absent marker is a no-op
    async fn clear_running_job(&self, job_type: &str) -> Result<()> {
        self.set_value(job_type, KEY_RUNNING, None).await?;
        Ok(())
    }

    async fn disable(&self, job_type: &str, comment: Option<&str>) -> Result<()> {
        self.set_value(job_type, KEY_DISABLED, Some(comment.unwrap_or("")))
            .await?;
        Ok(())
    }

    async fn enable(&self, job_type: &str) -> Result<()> {
        self.set_value(job_type, KEY_DISABLED, None).await?;
        Ok(())
    }
}
