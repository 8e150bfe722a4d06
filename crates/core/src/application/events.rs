// Job Event Listeners - fan-out, persistence and logging of job events

use crate::application::records::JobRecordService;
use crate::domain::{JobMessage, MessageLevel};
use crate::error::Result;
use crate::port::{JobEvent, JobEventKind, JobEventListener, JobState};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Delivers every event to all registered listeners.
///
/// A failing listener does not prevent delivery to the others; the first
/// error is returned after all listeners ran.
#[derive(Default)]
pub struct JobEventPublisher {
    listeners: Vec<Arc<dyn JobEventListener>>,
}

impl JobEventPublisher {
    pub fn new(listeners: Vec<Arc<dyn JobEventListener>>) -> Self {
        Self { listeners }
    }

    pub fn with_listener(mut self, listener: Arc<dyn JobEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }
}

#[async_trait]
impl JobEventListener for JobEventPublisher {
    async fn on_event(&self, event: &JobEvent) -> Result<()> {
        let mut first_error = None;
        for listener in &self.listeners {
            if let Err(e) = listener.on_event(event).await {
                error!(
                    job_id = %event.job_id,
                    job_type = %event.job_type,
                    event = ?event.kind,
                    error = %e,
                    "Job event listener failed"
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Writes job events through to the record store
pub struct PersistenceJobEventListener {
    records: Arc<JobRecordService>,
}

impl PersistenceJobEventListener {
    pub fn new(records: Arc<JobRecordService>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl JobEventListener for PersistenceJobEventListener {
    async fn on_event(&self, event: &JobEvent) -> Result<()> {
        let job_id = event.job_id.as_str();
        match &event.kind {
            // the record is created when the job is admitted
            JobEventKind::StateChanged(JobState::Start) => Ok(()),
            JobEventKind::StateChanged(JobState::KeepAlive) => self.records.keep_alive(job_id).await,
            JobEventKind::StateChanged(JobState::Restart) => {
                self.records.mark_restarted(job_id).await
            }
            JobEventKind::StateChanged(JobState::Skipped) => self.records.mark_skipped(job_id).await,
            JobEventKind::StateChanged(JobState::Stop) => self.records.stop_job(job_id).await,
            JobEventKind::StateChanged(JobState::Dead) => self.records.kill_job(job_id).await,
            JobEventKind::Message { level, message } => {
                let message = JobMessage::new(*level, message.clone(), self.records.now_millis());
                self.records.append_message(job_id, &message).await
            }
        }
    }
}

/// Mirrors job events into tracing
#[derive(Default)]
pub struct LoggingJobEventListener;

#[async_trait]
impl JobEventListener for LoggingJobEventListener {
    async fn on_event(&self, event: &JobEvent) -> Result<()> {
        let job_id = event.job_id.as_str();
        let job_type = event.job_type.as_str();
        match &event.kind {
            JobEventKind::StateChanged(JobState::KeepAlive) => {
                tracing::trace!(job_id, job_type, "Job keep-alive");
            }
            JobEventKind::StateChanged(state @ (JobState::Restart | JobState::Dead)) => {
                warn!(job_id, job_type, state = %state, "Job state changed");
            }
            JobEventKind::StateChanged(state) => {
                info!(job_id, job_type, state = %state, "Job state changed");
            }
            JobEventKind::Message { level, message } => match level {
                MessageLevel::Info => info!(job_id, job_type, "{}", message),
                MessageLevel::Warning => warn!(job_id, job_type, "{}", message),
                MessageLevel::Error => error!(job_id, job_type, "{}", message),
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::lock::JobLockService;
    use crate::domain::{JobMutexGroups, JobRecord, JobStatus};
    use crate::error::AppError;
    use crate::infrastructure::{InMemJobMetaStore, InMemJobRecordStore};
    use crate::port::job_event_listener::mocks::RecordingListener;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use crate::port::JobRecordStore;

    struct FailingListener;

    #[async_trait]
    impl JobEventListener for FailingListener {
        async fn on_event(&self, _event: &JobEvent) -> Result<()> {
            Err(AppError::Repository("unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_publisher_delivers_despite_failing_listener() {
        let recording = Arc::new(RecordingListener::new());
        let publisher = JobEventPublisher::default()
            .with_listener(Arc::new(FailingListener))
            .with_listener(recording.clone());

        let result = publisher
            .on_event(&JobEvent::state("id1", "IMPORT", JobState::Start))
            .await;

        assert!(matches!(result, Err(AppError::Repository(_))));
        assert_eq!(recording.count_state(JobState::Start), 1);
    }

    #[tokio::test]
    async fn test_persistence_listener_applies_lifecycle() {
        let store = Arc::new(InMemJobRecordStore::new());
        let locks = Arc::new(JobLockService::new(
            Arc::new(InMemJobMetaStore::new()),
            JobMutexGroups::default(),
        ));
        let time = Arc::new(FixedTimeProvider::new(5_000));
        let records = Arc::new(JobRecordService::new(store.clone(), locks.clone(), time.clone()));
        let listener = PersistenceJobEventListener::new(records);

        locks.acquire_run_lock("id1", "IMPORT").await.unwrap();
        store
            .create_or_update(&JobRecord::new("id1", "IMPORT", 1_000, "host-a"))
            .await
            .unwrap();

        listener
            .on_event(&JobEvent::state("id1", "IMPORT", JobState::KeepAlive))
            .await
            .unwrap();
        assert_eq!(store.find_one("id1").await.unwrap().unwrap().last_updated, 5_000);

        time.set(6_000);
        listener
            .on_event(&JobEvent::message("id1", "IMPORT", MessageLevel::Error, "boom"))
            .await
            .unwrap();
        listener
            .on_event(&JobEvent::state("id1", "IMPORT", JobState::Stop))
            .await
            .unwrap();

        let record = store.find_one("id1").await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Error);
        assert_eq!(record.stopped, Some(6_000));
        assert_eq!(record.messages[0].message, "boom");
        assert_eq!(locks.running_job("IMPORT").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_persistence_listener_unknown_job_fails() {
        let records = Arc::new(JobRecordService::new(
            Arc::new(InMemJobRecordStore::new()),
            Arc::new(JobLockService::new(
                Arc::new(InMemJobMetaStore::new()),
                JobMutexGroups::default(),
            )),
            Arc::new(FixedTimeProvider::new(0)),
        ));
        let listener = PersistenceJobEventListener::new(records);

        let result = listener
            .on_event(&JobEvent::state("missing", "IMPORT", JobState::KeepAlive))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
