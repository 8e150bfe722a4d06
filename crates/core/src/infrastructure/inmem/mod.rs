// In-memory backends (single process, tests and local development)

mod job_meta_store;
mod job_record_store;

pub use job_meta_store::InMemJobMetaStore;
pub use job_record_store::InMemJobRecordStore;
