// Application Layer - Use Cases and Business Logic

pub mod cleanup;
pub mod events;
pub mod lock;
pub mod records;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod service;
pub mod status;
pub mod worker;

// Re-exports
pub use cleanup::{
    CleanupScheduler, CleanupStrategy, ClearDeadLocks, DeleteSkippedJobs, KeepLastJobs,
    StopDeadJobs,
};
pub use events::{JobEventPublisher, LoggingJobEventListener, PersistenceJobEventListener};
pub use lock::JobLockService;
pub use records::JobRecordService;
pub use registry::JobRegistry;
pub use runner::{JobRunner, RunOutcome, RunnerState};
pub use scheduler::JobTriggerScheduler;
pub use service::{JobService, JobServiceDeps};
pub use status::{JobStatusCalculator, JobStatusService, StatusSources};
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, WorkerPool};
