// Overseer Infrastructure - SQLite Adapter
// Implements: JobRecordStore, JobMetaStore

mod connection;
mod error;
mod job_meta_store;
mod job_record_store;
mod migration;

pub use connection::create_pool;
pub use job_meta_store::SqliteJobMetaStore;
pub use job_record_store::SqliteJobRecordStore;
pub use migration::run_migrations;

// Note: sqlx::Error conversion is handled by map_sqlx_error
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
