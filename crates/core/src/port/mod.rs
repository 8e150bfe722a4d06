// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod job_event_listener;
pub mod job_meta_store;
pub mod job_metrics;
pub mod job_record_store;
pub mod job_runnable;
pub mod system_info;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use job_event_listener::{JobEvent, JobEventKind, JobEventListener, JobMessageSink, JobState};
pub use job_meta_store::JobMetaStore;
pub use job_metrics::JobMetrics;
pub use job_record_store::JobRecordStore;
pub use job_runnable::{ExecutionError, JobRunnable};
pub use system_info::SystemInfo;
pub use time_provider::TimeProvider;
