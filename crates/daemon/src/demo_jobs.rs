// Demo jobs registered by the daemon

use async_trait::async_trait;
use overseer_core::application::JobRegistry;
use overseer_core::domain::JobDefinition;
use overseer_core::error::Result;
use overseer_core::port::{ExecutionError, JobMessageSink, JobMetaStore, JobRunnable};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const CURSOR_KEY: &str = "cursor";

/// Logs a line every minute
struct HousekeepingJob {
    definition: JobDefinition,
}

impl HousekeepingJob {
    fn new() -> Self {
        Self {
            definition: JobDefinition::fixed_delay(
                "HOUSEKEEPING",
                "Housekeeping",
                "Periodic no-op that keeps the scheduler busy",
                Duration::from_secs(60),
            )
            .with_max_age(Duration::from_secs(300)),
        }
    }
}

#[async_trait]
impl JobRunnable for HousekeepingJob {
    fn definition(&self) -> &JobDefinition {
        &self.definition
    }

    async fn execute(&self, messages: &JobMessageSink) -> std::result::Result<bool, ExecutionError> {
        messages.info("Housekeeping done").await;
        Ok(true)
    }
}

/// Advances a cursor kept in the job meta store; skips every other run
struct CursorJob {
    definition: JobDefinition,
    meta_store: Arc<dyn JobMetaStore>,
}

impl CursorJob {
    fn new(definition: JobDefinition, meta_store: Arc<dyn JobMetaStore>) -> Self {
        Self {
            definition,
            meta_store,
        }
    }
}

#[async_trait]
impl JobRunnable for CursorJob {
    fn definition(&self) -> &JobDefinition {
        &self.definition
    }

    async fn execute(&self, messages: &JobMessageSink) -> std::result::Result<bool, ExecutionError> {
        let job_type = &self.definition.job_type;
        let cursor = self
            .meta_store
            .get_value(job_type, CURSOR_KEY)
            .await
            .map_err(ExecutionError::failed)?
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);

        let next = cursor + 1;
        self.meta_store
            .set_value(job_type, CURSOR_KEY, Some(&next.to_string()))
            .await
            .map_err(ExecutionError::failed)?;
        debug!(job_type = %job_type, cursor = next, "Cursor advanced");

        if next % 2 == 0 {
            return Ok(false);
        }
        messages.info(format!("Processed batch {}", next)).await;
        Ok(true)
    }
}

/// Registry of every demo job
pub fn registry(meta_store: Arc<dyn JobMetaStore>) -> Result<JobRegistry> {
    let import = JobDefinition::cron(
        "IMPORT",
        "Import",
        "Imports the next batch",
        "0 */5 * * * *",
    )
    .with_restarts(2)
    .with_retry_delay(Duration::from_secs(5))
    .with_max_age(Duration::from_secs(900));
    let export = JobDefinition::cron(
        "EXPORT",
        "Export",
        "Exports the processed batches",
        "30 */5 * * * *",
    )
    .with_max_age(Duration::from_secs(900));

    JobRegistry::new()
        .with(Arc::new(HousekeepingJob::new()))?
        .with(Arc::new(CursorJob::new(import, meta_store.clone())))?
        .with(Arc::new(CursorJob::new(export, meta_store)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use overseer_core::infrastructure::InMemJobMetaStore;
    use overseer_core::port::job_event_listener::mocks::RecordingListener;

    #[test]
    fn test_registry_contains_demo_jobs() {
        let registry = registry(Arc::new(InMemJobMetaStore::new())).unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.get("import").is_some());
        assert!(registry.get("HOUSEKEEPING").is_some());
    }

    #[tokio::test]
    async fn test_cursor_job_alternates_between_work_and_skip() {
        let meta: Arc<dyn JobMetaStore> = Arc::new(InMemJobMetaStore::new());
        let job = CursorJob::new(
            JobDefinition::manually_triggered("IMPORT", "Import", ""),
            meta.clone(),
        );
        let listener = Arc::new(RecordingListener::default());
        let sink = JobMessageSink::new("job-1", "IMPORT", listener.clone());

        assert!(job.execute(&sink).await.unwrap());
        assert!(!job.execute(&sink).await.unwrap());
        assert_eq!(
            meta.get_value("IMPORT", CURSOR_KEY).await.unwrap().as_deref(),
            Some("2")
        );
        assert_eq!(listener.messages().len(), 1);
    }
}
