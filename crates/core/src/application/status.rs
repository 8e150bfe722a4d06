// Job Status - health of job types derived from recent executions

use crate::config::{normalize_key, StatusConfig};
use crate::domain::{HealthStatus, JobDefinition, JobRecord, JobStatus, StatusDetail};
use crate::error::{AppError, Result};
use crate::port::{JobMetaStore, JobRecordStore, TimeProvider};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

const SUCCESS_MESSAGE: &str = "Last job was successful";
const ERROR_MESSAGE: &str = "Job had an error";
const DEAD_MESSAGE: &str = "Job died";
const LOAD_JOBS_EXCEPTION_MESSAGE: &str = "Failed to load job status";

pub const WARNING_ON_LAST_JOB_FAILED: &str = "warningOnLastJobFailed";
pub const ERROR_ON_LAST_JOB_FAILED: &str = "errorOnLastJobFailed";

/// Stores and clock a calculator reads from
#[derive(Clone)]
pub struct StatusSources {
    pub record_store: Arc<dyn JobRecordStore>,
    pub meta_store: Arc<dyn JobMetaStore>,
    pub time_provider: Arc<dyn TimeProvider>,
}

/// Calculates the health of a job type from its last `number_of_jobs`
/// executions, tolerating up to `max_failed_jobs` failures (ERROR or DEAD).
///
/// * latest OK or SKIPPED: WARNING if it is older than the definition's
///   max age or too many executions failed, otherwise OK
/// * latest ERROR: ERROR if too many executions failed, otherwise WARNING
/// * latest DEAD: always WARNING
///
/// A running OK execution is skipped in favour of the one before it.
/// Disabled job types are OK; store failures are ERROR.
pub struct JobStatusCalculator {
    key: String,
    number_of_jobs: usize,
    max_failed_jobs: usize,
    sources: StatusSources,
}

impl JobStatusCalculator {
    pub fn new(
        key: impl Into<String>,
        number_of_jobs: usize,
        max_failed_jobs: usize,
        sources: StatusSources,
    ) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(AppError::Validation("Key must not be empty".to_string()));
        }
        if number_of_jobs == 0 {
            return Err(AppError::Validation(
                "Parameter number_of_jobs must be greater 0".to_string(),
            ));
        }
        if max_failed_jobs > number_of_jobs {
            return Err(AppError::Validation(
                "Parameter max_failed_jobs must not be greater number_of_jobs".to_string(),
            ));
        }
        Ok(Self {
            key,
            number_of_jobs,
            max_failed_jobs,
            sources,
        })
    }

    /// WARNING if the last job failed
    pub fn warning_on_last_job_failed(key: impl Into<String>, sources: StatusSources) -> Result<Self> {
        Self::new(key, 1, 1, sources)
    }

    /// ERROR if the last job failed
    pub fn error_on_last_job_failed(key: impl Into<String>, sources: StatusSources) -> Result<Self> {
        Self::new(key, 1, 0, sources)
    }

    /// ERROR if all of the last `num_jobs` jobs failed
    pub fn error_on_last_num_jobs_failed(
        key: impl Into<String>,
        num_jobs: usize,
        sources: StatusSources,
    ) -> Result<Self> {
        Self::new(key, num_jobs, num_jobs.saturating_sub(1), sources)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn status_detail(&self, definition: &JobDefinition) -> StatusDetail {
        match self.calculate(definition).await {
            Ok(detail) => detail,
            Err(e) => {
                error!(job_type = %definition.job_type, error = %e, "{}", LOAD_JOBS_EXCEPTION_MESSAGE);
                StatusDetail::new(&definition.job_name, HealthStatus::Error, LOAD_JOBS_EXCEPTION_MESSAGE)
            }
        }
    }

    async fn calculate(&self, definition: &JobDefinition) -> Result<StatusDetail> {
        let meta = self.sources.meta_store.get_job_meta(&definition.job_type).await?;
        if meta.disabled {
            return Ok(StatusDetail::new(
                &definition.job_name,
                HealthStatus::Ok,
                format!("Job is deactivated: {}", meta.disabled_comment),
            ));
        }

        let mut records = self
            .sources
            .record_store
            .find_latest_by_type(&definition.job_type, self.number_of_jobs + 1)
            .await?;
        if records.is_empty() {
            return Ok(StatusDetail::new(&definition.job_name, HealthStatus::Ok, SUCCESS_MESSAGE));
        }
        if records.len() > 1 && records[0].is_running() && records[0].status == JobStatus::Ok {
            records.remove(0);
        }
        records.truncate(self.number_of_jobs);

        let num_failed = records.iter().filter(|r| r.status.is_failure()).count();
        let too_many_failed = num_failed > self.max_failed_jobs;
        let failed_message = format!("{} out of {} job executions failed", num_failed, records.len());
        let last = &records[0];

        let (status, message) = match last.status {
            JobStatus::Ok | JobStatus::Skipped => {
                if self.too_old(last, definition) {
                    (HealthStatus::Warning, job_age_message(definition))
                } else if too_many_failed {
                    (HealthStatus::Warning, failed_message)
                } else {
                    (HealthStatus::Ok, SUCCESS_MESSAGE.to_string())
                }
            }
            JobStatus::Error => {
                let status = if too_many_failed {
                    HealthStatus::Error
                } else {
                    HealthStatus::Warning
                };
                if self.number_of_jobs == 1 && self.max_failed_jobs <= 1 {
                    (status, ERROR_MESSAGE.to_string())
                } else {
                    (status, failed_message)
                }
            }
            JobStatus::Dead => (HealthStatus::Warning, DEAD_MESSAGE.to_string()),
        };

        Ok(with_running_details(
            StatusDetail::new(&definition.job_name, status, message),
            last,
        ))
    }

    /// Measured from the start of the evaluated execution
    fn too_old(&self, record: &JobRecord, definition: &JobDefinition) -> bool {
        match definition.max_age {
            Some(max_age) => {
                let deadline = record.started + max_age.as_millis() as i64;
                deadline < self.sources.time_provider.now_millis()
            }
            None => false,
        }
    }
}

fn job_age_message(definition: &JobDefinition) -> String {
    match definition.max_age {
        Some(max_age) => format!("Job didn't run in the past {} seconds", max_age.as_secs()),
        None => "Job didn't run in the past N/A".to_string(),
    }
}

fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

fn with_running_details(detail: StatusDetail, record: &JobRecord) -> StatusDetail {
    let detail = detail
        .with_detail("Job Id", &record.id)
        .with_detail("Started", format_millis(record.started));
    match record.stopped {
        Some(stopped) => detail.with_detail("Stopped", format_millis(stopped)),
        None => detail,
    }
}

/// Health of every registered job type, each through its configured
/// calculator (or the `default` one)
pub struct JobStatusService {
    calculators: HashMap<String, Arc<JobStatusCalculator>>,
    config: StatusConfig,
    definitions: Vec<JobDefinition>,
}

impl JobStatusService {
    pub fn new(
        calculators: Vec<JobStatusCalculator>,
        config: StatusConfig,
        definitions: Vec<JobDefinition>,
    ) -> Result<Self> {
        let calculators: HashMap<String, Arc<JobStatusCalculator>> = calculators
            .into_iter()
            .map(|c| (normalize_key(c.key()), Arc::new(c)))
            .collect();

        for (job_type, key) in &config.calculator {
            if !calculators.contains_key(&normalize_key(key)) {
                return Err(AppError::Config(format!(
                    "unknown status calculator '{}' configured for {}",
                    key, job_type
                )));
            }
        }

        Ok(Self {
            calculators,
            config,
            definitions,
        })
    }

    /// Built-in calculators: warningOnLastJobFailed and errorOnLastJobFailed
    pub fn default_calculators(sources: StatusSources) -> Result<Vec<JobStatusCalculator>> {
        Ok(vec![
            JobStatusCalculator::warning_on_last_job_failed(WARNING_ON_LAST_JOB_FAILED, sources.clone())?,
            JobStatusCalculator::error_on_last_job_failed(ERROR_ON_LAST_JOB_FAILED, sources)?,
        ])
    }

    fn calculator_for(&self, job_type: &str) -> Option<&Arc<JobStatusCalculator>> {
        self.config
            .calculator_for(job_type)
            .and_then(|key| self.calculators.get(&normalize_key(key)))
    }

    pub async fn status_details(&self) -> Vec<StatusDetail> {
        let mut details = Vec::with_capacity(self.definitions.len());
        for definition in &self.definitions {
            let detail = match self.calculator_for(&definition.job_type) {
                Some(calculator) => calculator.status_detail(definition).await,
                None => StatusDetail::new(
                    &definition.job_name,
                    HealthStatus::Ok,
                    "No status calculator configured",
                ),
            };
            details.push(detail);
        }
        details
    }

    /// Worst status over all job types
    pub async fn aggregate_status(&self) -> HealthStatus {
        self.status_details()
            .await
            .into_iter()
            .map(|d| d.status)
            .max()
            .unwrap_or(HealthStatus::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobMessage, JobMeta};
    use crate::infrastructure::{InMemJobMetaStore, InMemJobRecordStore};
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000_000;

    struct Fixture {
        store: Arc<InMemJobRecordStore>,
        meta: Arc<InMemJobMetaStore>,
        sources: StatusSources,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemJobRecordStore::new());
        let meta = Arc::new(InMemJobMetaStore::new());
        let sources = StatusSources {
            record_store: store.clone(),
            meta_store: meta.clone(),
            time_provider: Arc::new(FixedTimeProvider::new(NOW)),
        };
        Fixture { store, meta, sources }
    }

    fn definition() -> JobDefinition {
        JobDefinition::manually_triggered("IMPORT", "Import", "")
    }

    async fn add(f: &Fixture, id: &str, started: i64, status: JobStatus, stopped: bool) {
        let mut record = JobRecord::new(id, "IMPORT", started, "host-a");
        record.status = status;
        if stopped {
            record.stop(started + 1_000).unwrap();
        }
        f.store.create_or_update(&record).await.unwrap();
    }

    #[tokio::test]
    async fn test_no_records_is_ok() {
        let f = fixture();
        let calc = JobStatusCalculator::warning_on_last_job_failed("w", f.sources.clone()).unwrap();
        let detail = calc.status_detail(&definition()).await;
        assert_eq!(detail.status, HealthStatus::Ok);
        assert_eq!(detail.message, SUCCESS_MESSAGE);
    }

    #[tokio::test]
    async fn test_last_ok_is_ok_with_details() {
        let f = fixture();
        add(&f, "a", NOW - 5_000, JobStatus::Ok, true).await;
        let calc = JobStatusCalculator::error_on_last_job_failed("e", f.sources.clone()).unwrap();

        let detail = calc.status_detail(&definition()).await;

        assert_eq!(detail.status, HealthStatus::Ok);
        assert_eq!(detail.name, "Import");
        assert_eq!(detail.details.get("Job Id").map(String::as_str), Some("a"));
        assert!(detail.details.contains_key("Started"));
        assert!(detail.details.contains_key("Stopped"));
    }

    #[tokio::test]
    async fn test_last_error_uses_configured_severity() {
        let f = fixture();
        add(&f, "a", NOW - 5_000, JobStatus::Error, true).await;

        let warning = JobStatusCalculator::warning_on_last_job_failed("w", f.sources.clone()).unwrap();
        let detail = warning.status_detail(&definition()).await;
        assert_eq!(detail.status, HealthStatus::Warning);
        assert_eq!(detail.message, ERROR_MESSAGE);

        let error = JobStatusCalculator::error_on_last_job_failed("e", f.sources.clone()).unwrap();
        assert_eq!(error.status_detail(&definition()).await.status, HealthStatus::Error);
    }

    #[tokio::test]
    async fn test_last_dead_is_at_most_warning() {
        let f = fixture();
        add(&f, "a", NOW - 5_000, JobStatus::Dead, true).await;
        let calc = JobStatusCalculator::error_on_last_job_failed("e", f.sources.clone()).unwrap();

        let detail = calc.status_detail(&definition()).await;

        assert_eq!(detail.status, HealthStatus::Warning);
        assert_eq!(detail.message, DEAD_MESSAGE);
    }

    #[tokio::test]
    async fn test_error_on_last_num_jobs_failed() {
        let f = fixture();
        add(&f, "a", NOW - 30_000, JobStatus::Ok, true).await;
        add(&f, "b", NOW - 20_000, JobStatus::Error, true).await;
        add(&f, "c", NOW - 10_000, JobStatus::Error, true).await;
        let calc =
            JobStatusCalculator::error_on_last_num_jobs_failed("n", 3, f.sources.clone()).unwrap();

        let detail = calc.status_detail(&definition()).await;
        assert_eq!(detail.status, HealthStatus::Warning);
        assert_eq!(detail.message, "2 out of 3 job executions failed");

        add(&f, "d", NOW - 5_000, JobStatus::Error, true).await;
        assert_eq!(calc.status_detail(&definition()).await.status, HealthStatus::Error);
    }

    #[tokio::test]
    async fn test_running_ok_job_is_ignored() {
        let f = fixture();
        add(&f, "a", NOW - 20_000, JobStatus::Error, true).await;
        add(&f, "b", NOW - 1_000, JobStatus::Ok, false).await;
        let calc = JobStatusCalculator::error_on_last_job_failed("e", f.sources.clone()).unwrap();

        let detail = calc.status_detail(&definition()).await;

        assert_eq!(detail.status, HealthStatus::Error);
        assert_eq!(detail.details.get("Job Id").map(String::as_str), Some("a"));
    }

    #[tokio::test]
    async fn test_stale_job_is_warning() {
        let f = fixture();
        add(&f, "a", NOW - 7_200_000, JobStatus::Ok, true).await;
        let calc = JobStatusCalculator::warning_on_last_job_failed("w", f.sources.clone()).unwrap();
        let definition = definition().with_max_age(Duration::from_secs(3_600));

        let detail = calc.status_detail(&definition).await;

        assert_eq!(detail.status, HealthStatus::Warning);
        assert_eq!(detail.message, "Job didn't run in the past 3600 seconds");
    }

    #[tokio::test]
    async fn test_disabled_job_is_ok() {
        let f = fixture();
        add(&f, "a", NOW - 5_000, JobStatus::Error, true).await;
        f.meta.disable("IMPORT", Some("migration")).await.unwrap();
        let calc = JobStatusCalculator::error_on_last_job_failed("e", f.sources.clone()).unwrap();

        let detail = calc.status_detail(&definition()).await;

        assert_eq!(detail.status, HealthStatus::Ok);
        assert_eq!(detail.message, "Job is deactivated: migration");
    }

    struct BrokenMetaStore;

    #[async_trait]
    impl JobMetaStore for BrokenMetaStore {
        async fn get_value(&self, _: &str, _: &str) -> Result<Option<String>> {
            Err(AppError::Repository("down".to_string()))
        }
        async fn set_value(&self, _: &str, _: &str, _: Option<&str>) -> Result<Option<String>> {
            Err(AppError::Repository("down".to_string()))
        }
        async fn create_value(&self, _: &str, _: &str, _: &str) -> Result<bool> {
            Err(AppError::Repository("down".to_string()))
        }
        async fn get_job_meta(&self, _: &str) -> Result<JobMeta> {
            Err(AppError::Repository("down".to_string()))
        }
        async fn find_all_job_types(&self) -> Result<BTreeSet<String>> {
            Err(AppError::Repository("down".to_string()))
        }
        async fn delete_all(&self) -> Result<()> {
            Err(AppError::Repository("down".to_string()))
        }
    }

    struct BrokenRecordStore;

    fn down<T>() -> Result<T> {
        Err(AppError::Repository("down".to_string()))
    }

    #[async_trait]
    impl JobRecordStore for BrokenRecordStore {
        async fn create_or_update(&self, _: &JobRecord) -> Result<()> {
            down()
        }
        async fn find_one(&self, _: &str) -> Result<Option<JobRecord>> {
            down()
        }
        async fn find_all(&self) -> Result<Vec<JobRecord>> {
            down()
        }
        async fn find_by_type(&self, _: &str) -> Result<Vec<JobRecord>> {
            down()
        }
        async fn find_latest(&self, _: usize) -> Result<Vec<JobRecord>> {
            down()
        }
        async fn find_latest_by_type(&self, _: &str, _: usize) -> Result<Vec<JobRecord>> {
            down()
        }
        async fn find_running_without_update_since(&self, _: i64) -> Result<Vec<JobRecord>> {
            down()
        }
        async fn append_message(&self, _: &str, _: &JobMessage) -> Result<()> {
            down()
        }
        async fn set_status(&self, _: &str, _: JobStatus) -> Result<()> {
            down()
        }
        async fn set_last_updated(&self, _: &str, _: i64) -> Result<()> {
            down()
        }
        async fn remove(&self, _: &str) -> Result<()> {
            down()
        }
        async fn remove_if_stopped(&self, _: &str) -> Result<bool> {
            down()
        }
        async fn count(&self) -> Result<u64> {
            down()
        }
        async fn delete_all(&self) -> Result<()> {
            down()
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_error() {
        let f = fixture();
        let sources = StatusSources {
            meta_store: Arc::new(BrokenMetaStore),
            ..f.sources.clone()
        };
        let calc = JobStatusCalculator::warning_on_last_job_failed("w", sources).unwrap();

        let detail = calc.status_detail(&definition()).await;

        assert_eq!(detail.status, HealthStatus::Error);
        assert_eq!(detail.message, LOAD_JOBS_EXCEPTION_MESSAGE);
    }

    #[tokio::test]
    async fn test_record_store_failure_is_error() {
        let f = fixture();
        add(&f, "a", NOW - 5_000, JobStatus::Ok, true).await;
        let sources = StatusSources {
            record_store: Arc::new(BrokenRecordStore),
            ..f.sources.clone()
        };
        let calc = JobStatusCalculator::warning_on_last_job_failed("w", sources).unwrap();

        let detail = calc.status_detail(&definition()).await;

        assert_eq!(detail.status, HealthStatus::Error);
        assert_eq!(detail.message, LOAD_JOBS_EXCEPTION_MESSAGE);
    }

    #[test]
    fn test_constructor_validation() {
        let f = fixture();
        assert!(JobStatusCalculator::new("", 1, 0, f.sources.clone()).is_err());
        assert!(JobStatusCalculator::new("k", 0, 0, f.sources.clone()).is_err());
        assert!(JobStatusCalculator::new("k", 1, 2, f.sources.clone()).is_err());
        assert!(JobStatusCalculator::new("k", 2, 2, f.sources.clone()).is_ok());
    }

    #[tokio::test]
    async fn test_status_service_aggregates_worst() {
        let f = fixture();
        add(&f, "a", NOW - 5_000, JobStatus::Error, true).await;
        let mut config = StatusConfig::default();
        config
            .calculator
            .insert("import".to_string(), ERROR_ON_LAST_JOB_FAILED.to_string());

        let service = JobStatusService::new(
            JobStatusService::default_calculators(f.sources.clone()).unwrap(),
            config,
            vec![
                definition(),
                JobDefinition::manually_triggered("EXPORT", "Export", ""),
            ],
        )
        .unwrap();

        let details = service.status_details().await;
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].status, HealthStatus::Error);
        assert_eq!(details[1].status, HealthStatus::Ok);
        assert_eq!(service.aggregate_status().await, HealthStatus::Error);
    }

    #[test]
    fn test_status_service_rejects_unknown_calculator() {
        let f = fixture();
        let mut config = StatusConfig::default();
        config
            .calculator
            .insert("IMPORT".to_string(), "doesNotExist".to_string());

        let result = JobStatusService::new(
            JobStatusService::default_calculators(f.sources.clone()).unwrap(),
            config,
            vec![],
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
