//! Overseer - Main Entry Point
//! Wires stores, services and schedulers, then runs until Ctrl+C

mod demo_jobs;
mod settings;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use overseer_core::application::worker::constants::SHUTDOWN_GRACE_PERIOD;
use overseer_core::application::{
    shutdown_channel, CleanupScheduler, CleanupStrategy, ClearDeadLocks, DeleteSkippedJobs,
    JobEventPublisher, JobLockService, JobRecordService, JobService, JobServiceDeps,
    JobStatusService, JobTriggerScheduler, KeepLastJobs, LoggingJobEventListener,
    PersistenceJobEventListener, ShutdownToken, StatusSources, StopDeadJobs,
};
use overseer_core::infrastructure::{InMemJobMetaStore, InMemJobRecordStore};
use overseer_core::port::id_provider::UuidProvider;
use overseer_core::port::job_metrics::InMemoryJobMetrics;
use overseer_core::port::time_provider::SystemTimeProvider;
use overseer_core::port::{JobMetaStore, JobRecordStore, TimeProvider};
use overseer_infra_sqlite::{create_pool, run_migrations, SqliteJobMetaStore, SqliteJobRecordStore};
use overseer_infra_system::SystemInfoImpl;
use settings::{BackendConfig, DaemonConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often the aggregated job health is logged
const STATUS_REPORT_INTERVAL: Duration = Duration::from_secs(60);

struct Stores {
    records: Arc<dyn JobRecordStore>,
    meta: Arc<dyn JobMetaStore>,
}

async fn open_stores(backend: &BackendConfig) -> Result<Stores> {
    match backend {
        BackendConfig::Memory => {
            warn!("Using in-memory stores; job history is lost on exit");
            Ok(Stores {
                records: Arc::new(InMemJobRecordStore::new()),
                meta: Arc::new(InMemJobMetaStore::new()),
            })
        }
        BackendConfig::Sqlite { path } => {
            info!(db_path = %path, "Initializing database...");
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let pool = create_pool(&format!("sqlite://{}", path)).await?;
            run_migrations(&pool).await?;
            Ok(Stores {
                records: Arc::new(SqliteJobRecordStore::new(pool.clone())),
                meta: Arc::new(SqliteJobMetaStore::new(pool)),
            })
        }
        BackendConfig::Redis { url, key_prefix } => {
            info!(key_prefix = %key_prefix, "Connecting to redis...");
            let conn = overseer_infra_redis::connect(url).await?;
            Ok(Stores {
                records: Arc::new(overseer_infra_redis::RedisJobRecordStore::new(
                    conn.clone(),
                    key_prefix.as_str(),
                )),
                meta: Arc::new(overseer_infra_redis::RedisJobMetaStore::new(
                    conn,
                    key_prefix.as_str(),
                )),
            })
        }
    }
}

/// Log the health of every job type until shutdown
async fn report_status(status: JobStatusService, mut shutdown: ShutdownToken) {
    let mut tick = tokio::time::interval(STATUS_REPORT_INTERVAL);
    loop {
        tokio::select! {
            _ = tick.tick() => {
                for detail in status.status_details().await {
                    info!(
                        job = %detail.name,
                        status = %detail.status,
                        message = %detail.message,
                        "Job status"
                    );
                }
            }
            _ = shutdown.wait() => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let config = DaemonConfig::load()?;
    let _log_guard = telemetry::init(config.log_format)?;

    info!("Overseer v{} starting...", VERSION);

    // 2. Stores and core services (DI wiring)
    let stores = open_stores(&config.backend).await?;
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);

    let locks = Arc::new(JobLockService::new(
        stores.meta.clone(),
        config.jobs.mutex_groups(),
    ));
    let records = Arc::new(JobRecordService::new(
        stores.records.clone(),
        locks,
        time_provider.clone(),
    ));
    let events = Arc::new(
        JobEventPublisher::default()
            .with_listener(Arc::new(PersistenceJobEventListener::new(records.clone())))
            .with_listener(Arc::new(LoggingJobEventListener)),
    );

    let service = Arc::new(
        JobService::new(
            JobServiceDeps {
                registry: demo_jobs::registry(stores.meta.clone())?,
                records: records.clone(),
                events,
                metrics: Arc::new(InMemoryJobMetrics::new()),
                id_provider: Arc::new(UuidProvider),
                system_info: Arc::new(SystemInfoImpl::new()),
            },
            config.jobs.thread_count,
        )
        .with_heartbeat_interval(config.jobs.heartbeat_interval()),
    );

    // 3. Startup recovery: reclaim locks and records of a crashed predecessor
    info!("Running startup recovery...");
    let recovery = CleanupScheduler::new(
        vec![
            Arc::new(StopDeadJobs::new(
                records.clone(),
                config.jobs.cleanup.mark_dead_after(),
            )) as Arc<dyn CleanupStrategy>,
            Arc::new(ClearDeadLocks::new(records.clone())),
        ],
        config.jobs.cleanup.interval(),
    );
    let recovered = recovery.run_now().await;
    info!(recovered, "Startup recovery completed");

    let status = JobStatusService::new(
        JobStatusService::default_calculators(StatusSources {
            record_store: stores.records.clone(),
            meta_store: stores.meta.clone(),
            time_provider,
        })?,
        config.jobs.status.clone(),
        service.definitions(),
    )?;

    // 4. Background loops
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let mut handles: Vec<JoinHandle<()>> =
        JobTriggerScheduler::new(service.clone()).spawn_all(shutdown_rx.clone())?;

    let cleanup = CleanupScheduler::new(
        vec![
            Arc::new(KeepLastJobs::new(
                stores.records.clone(),
                config.jobs.cleanup.number_of_jobs_to_keep,
            )) as Arc<dyn CleanupStrategy>,
            Arc::new(DeleteSkippedJobs::new(
                stores.records.clone(),
                config.jobs.cleanup.number_of_skipped_jobs_to_keep,
            )),
            Arc::new(StopDeadJobs::new(
                records.clone(),
                config.jobs.cleanup.mark_dead_after(),
            )),
            Arc::new(ClearDeadLocks::new(records)),
        ],
        config.jobs.cleanup.interval(),
    );
    handles.push(tokio::spawn(cleanup.run(shutdown_rx.clone())));
    handles.push(tokio::spawn(report_status(status, shutdown_rx)));

    info!("System ready");
    info!("Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 6. Graceful shutdown: stop triggering, then drain running jobs
    shutdown_tx.shutdown();
    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Background task failed");
        }
    }
    if !service.shutdown(SHUTDOWN_GRACE_PERIOD).await {
        warn!("Some jobs did not finish; they will be marked dead by the next instance");
    }

    info!("Shutdown complete.");
    Ok(())
}
