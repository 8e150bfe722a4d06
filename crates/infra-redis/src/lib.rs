// Overseer Infrastructure - Redis Adapter
// Implements: JobRecordStore, JobMetaStore

mod connection;
mod error;
mod job_meta_store;
mod job_record_store;

pub use connection::connect;
pub use job_meta_store::RedisJobMetaStore;
pub use job_record_store::RedisJobRecordStore;

/// Key prefix used when none is configured
pub const DEFAULT_KEY_PREFIX: &str = "overseer";
