// Job Event Port - lifecycle and message events emitted by running jobs

use crate::domain::MessageLevel;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Lifecycle transitions published by the job runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Start,
    KeepAlive,
    Restart,
    Skipped,
    Stop,
    Dead,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Start => write!(f, "START"),
            JobState::KeepAlive => write!(f, "KEEP_ALIVE"),
            JobState::Restart => write!(f, "RESTART"),
            JobState::Skipped => write!(f, "SKIPPED"),
            JobState::Stop => write!(f, "STOP"),
            JobState::Dead => write!(f, "DEAD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEventKind {
    StateChanged(JobState),
    Message { level: MessageLevel, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    pub job_id: String,
    pub job_type: String,
    pub kind: JobEventKind,
}

impl JobEvent {
    pub fn state(job_id: impl Into<String>, job_type: impl Into<String>, state: JobState) -> Self {
        Self {
            job_id: job_id.into(),
            job_type: job_type.into(),
            kind: JobEventKind::StateChanged(state),
        }
    }

    pub fn message(
        job_id: impl Into<String>,
        job_type: impl Into<String>,
        level: MessageLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            job_type: job_type.into(),
            kind: JobEventKind::Message {
                level,
                message: message.into(),
            },
        }
    }
}

/// Consumer of job events (persistence, logging, monitoring)
#[async_trait]
pub trait JobEventListener: Send + Sync {
    async fn on_event(&self, event: &JobEvent) -> Result<()>;
}

/// Message channel handed to a job body, scoped to one execution.
///
/// Delivery failures are logged and never surface to the job body.
#[derive(Clone)]
pub struct JobMessageSink {
    job_id: String,
    job_type: String,
    listener: Arc<dyn JobEventListener>,
}

impl JobMessageSink {
    pub fn new(
        job_id: impl Into<String>,
        job_type: impl Into<String>,
        listener: Arc<dyn JobEventListener>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            job_type: job_type.into(),
            listener,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub async fn message(&self, level: MessageLevel, message: impl Into<String>) {
        let event = JobEvent::message(&self.job_id, &self.job_type, level, message);
        if let Err(e) = self.listener.on_event(&event).await {
            warn!(
                job_id = %self.job_id,
                job_type = %self.job_type,
                error = %e,
                "Failed to deliver job message"
            );
        }
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.message(MessageLevel::Info, message).await
    }

    pub async fn warn(&self, message: impl Into<String>) {
        self.message(MessageLevel::Warning, message).await
    }

    /// Also flags the execution as ERROR once persisted
    pub async fn error(&self, message: impl Into<String>) {
        self.message(MessageLevel::Error, message).await
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records every event it receives
    #[derive(Default)]
    pub struct RecordingListener {
        events: Mutex<Vec<JobEvent>>,
    }

    impl RecordingListener {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<JobEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn count_state(&self, state: JobState) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.kind == JobEventKind::StateChanged(state))
                .count()
        }

        pub fn messages(&self) -> Vec<(MessageLevel, String)> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match &e.kind {
                    JobEventKind::Message { level, message } => Some((*level, message.clone())),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl JobEventListener for RecordingListener {
        async fn on_event(&self, event: &JobEvent) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }
}
