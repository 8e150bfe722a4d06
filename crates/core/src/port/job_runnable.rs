// Job Runnable Port - implemented by job authors

use crate::domain::JobDefinition;
use crate::port::job_event_listener::JobMessageSink;
use async_trait::async_trait;
use thiserror::Error;

/// Failure of a job body
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Job failed: {0}")]
    Failed(String),

    #[error("Job panicked: {0}")]
    Panicked(String),
}

impl ExecutionError {
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        ExecutionError::Failed(reason.to_string())
    }
}

/// A unit of background work registered for one job type.
///
/// `execute` returns `Ok(true)` when work was done, `Ok(false)` when the
/// execution decided to skip, and `Err` on failure (eligible for restart).
/// Job bodies that need state across executions hold an
/// `Arc<dyn JobMetaStore>` themselves.
#[async_trait]
pub trait JobRunnable: Send + Sync {
    fn definition(&self) -> &JobDefinition;

    async fn execute(&self, messages: &JobMessageSink) -> Result<bool, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Mock runnable behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Always report a skipped execution
        Skip,
        /// Always fail with message
        Fail(String),
        /// Fail the first N invocations, then succeed
        FailTimes(usize),
        /// Panic with message (for panic isolation testing)
        Panic(String),
        /// Sleep, then succeed
        Sleep(Duration),
    }

    pub struct MockJobRunnable {
        definition: JobDefinition,
        behavior: MockBehavior,
        call_count: AtomicUsize,
    }

    impl MockJobRunnable {
        pub fn new(definition: JobDefinition, behavior: MockBehavior) -> Self {
            Self {
                definition,
                behavior,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn manual(job_type: &str, behavior: MockBehavior) -> Self {
            Self::new(
                JobDefinition::manually_triggered(job_type, job_type, "mock job"),
                behavior,
            )
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobRunnable for MockJobRunnable {
        fn definition(&self) -> &JobDefinition {
            &self.definition
        }

        async fn execute(&self, messages: &JobMessageSink) -> Result<bool, ExecutionError> {
            let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;

            match &self.behavior {
                MockBehavior::Success => {
                    messages.info(format!("mock execution {}", call)).await;
                    Ok(true)
                }
                MockBehavior::Skip => Ok(false),
                MockBehavior::Fail(msg) => Err(ExecutionError::Failed(msg.clone())),
                MockBehavior::FailTimes(n) if call <= *n => {
                    Err(ExecutionError::Failed(format!("failure {}", call)))
                }
                MockBehavior::FailTimes(_) => Ok(true),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
                MockBehavior::Sleep(duration) => {
                    tokio::time::sleep(*duration).await;
                    Ok(true)
                }
            }
        }
    }
}
