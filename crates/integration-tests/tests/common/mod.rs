//! Shared wiring for integration tests
//!
//! Builds a complete `JobService` over either backend so every scenario
//! runs against the in-memory stores and SQLite alike.

#![allow(dead_code)]

use std::sync::Arc;

use overseer_core::application::{
    JobEventPublisher, JobLockService, JobRecordService, JobRegistry, JobService, JobServiceDeps,
    PersistenceJobEventListener,
};
use overseer_core::domain::{JobMutexGroup, JobMutexGroups};
use overseer_core::infrastructure::{InMemJobMetaStore, InMemJobRecordStore};
use overseer_core::port::id_provider::mocks::SequenceIdProvider;
use overseer_core::port::job_metrics::InMemoryJobMetrics;
use overseer_core::port::job_runnable::mocks::MockJobRunnable;
use overseer_core::port::system_info::StaticSystemInfo;
use overseer_core::port::time_provider::mocks::FixedTimeProvider;
use overseer_core::port::{JobMetaStore, JobRecordStore};
use overseer_infra_sqlite::{create_pool, run_migrations, SqliteJobMetaStore, SqliteJobRecordStore};

#[derive(Debug, Clone, Copy)]
pub enum Backend {
    Memory,
    Sqlite,
}

pub const BACKENDS: [Backend; 2] = [Backend::Memory, Backend::Sqlite];

pub struct Stores {
    pub records: Arc<dyn JobRecordStore>,
    pub meta: Arc<dyn JobMetaStore>,
}

pub async fn open_stores(backend: Backend) -> Stores {
    match backend {
        Backend::Memory => Stores {
            records: Arc::new(InMemJobRecordStore::new()),
            meta: Arc::new(InMemJobMetaStore::new()),
        },
        Backend::Sqlite => {
            let pool = create_pool("sqlite::memory:").await.unwrap();
            run_migrations(&pool).await.unwrap();
            Stores {
                records: Arc::new(SqliteJobRecordStore::new(pool.clone())),
                meta: Arc::new(SqliteJobMetaStore::new(pool)),
            }
        }
    }
}

pub struct Harness {
    pub service: Arc<JobService>,
    pub stores: Stores,
    pub records: Arc<JobRecordService>,
    pub locks: Arc<JobLockService>,
    pub clock: Arc<FixedTimeProvider>,
}

pub async fn harness(
    backend: Backend,
    runnables: Vec<Arc<MockJobRunnable>>,
    groups: Vec<JobMutexGroup>,
) -> Harness {
    let stores = open_stores(backend).await;
    let clock = Arc::new(FixedTimeProvider::new(1_000_000));
    let locks = Arc::new(JobLockService::new(
        stores.meta.clone(),
        JobMutexGroups::new(groups),
    ));
    let records = Arc::new(JobRecordService::new(
        stores.records.clone(),
        locks.clone(),
        clock.clone(),
    ));
    let events = Arc::new(
        JobEventPublisher::default()
            .with_listener(Arc::new(PersistenceJobEventListener::new(records.clone()))),
    );

    let mut registry = JobRegistry::new();
    for runnable in runnables {
        registry.register(runnable).unwrap();
    }

    let service = Arc::new(JobService::new(
        JobServiceDeps {
            registry,
            records: records.clone(),
            events,
            metrics: Arc::new(InMemoryJobMetrics::new()),
            id_provider: Arc::new(SequenceIdProvider::default()),
            system_info: Arc::new(StaticSystemInfo::new("test-host")),
        },
        4,
    ));

    Harness {
        service,
        stores,
        records,
        locks,
        clock,
    }
}
