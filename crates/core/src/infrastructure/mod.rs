// Infrastructure shipped with the core: in-memory store backends
// (database-backed stores live in the infra-* crates)

pub mod inmem;

pub use inmem::{InMemJobMetaStore, InMemJobRecordStore};
