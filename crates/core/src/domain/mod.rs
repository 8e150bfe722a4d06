// Domain Layer - Pure business logic and entities

pub mod definition;
pub mod error;
pub mod job;
pub mod meta;
pub mod mutex;
pub mod status;

// Re-exports
pub use definition::{JobDefinition, JobSchedule};
pub use error::DomainError;
pub use job::{JobId, JobMessage, JobRecord, JobStatus, JobType, MessageLevel};
pub use meta::{DisabledJob, JobMeta, RunningJob, KEY_DISABLED, KEY_RUNNING, RESERVED_KEY_PREFIX};
pub use mutex::{JobMutexGroup, JobMutexGroups};
pub use status::{HealthStatus, StatusDetail};
