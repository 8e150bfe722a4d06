// Job Orchestration Configuration

use crate::application::worker::constants::{DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_THREAD_COUNT};
use crate::domain::{JobMutexGroup, JobMutexGroups};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Calculator used for job types without an explicit entry
pub const DEFAULT_CALCULATOR_ENTRY: &str = "default";

/// Top-level job configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Max concurrently executing job bodies
    pub thread_count: usize,
    pub heartbeat_interval_secs: u64,
    pub cleanup: CleanupConfig,
    pub status: StatusConfig,
    pub mutex_groups: Vec<JobMutexGroup>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            thread_count: DEFAULT_THREAD_COUNT,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL.as_secs(),
            cleanup: CleanupConfig::default(),
            status: StatusConfig::default(),
            mutex_groups: Vec::new(),
        }
    }
}

impl JobsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.thread_count == 0 {
            return Err(AppError::Config("thread_count must be at least 1".to_string()));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(AppError::Config(
                "heartbeat_interval_secs must be at least 1".to_string(),
            ));
        }
        self.cleanup.validate()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn mutex_groups(&self) -> JobMutexGroups {
        JobMutexGroups::new(self.mutex_groups.clone())
    }
}

/// Sweeper settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub number_of_jobs_to_keep: usize,
    pub number_of_skipped_jobs_to_keep: usize,
    pub mark_dead_after_secs: u64,
    pub interval_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            number_of_jobs_to_keep: 100,
            number_of_skipped_jobs_to_keep: 10,
            mark_dead_after_secs: 30,
            interval_secs: 600,
        }
    }
}

impl CleanupConfig {
    pub fn validate(&self) -> Result<()> {
        if self.number_of_jobs_to_keep == 0 {
            return Err(AppError::Config(
                "cleanup.number_of_jobs_to_keep must be at least 1".to_string(),
            ));
        }
        if self.mark_dead_after_secs == 0 {
            return Err(AppError::Config(
                "cleanup.mark_dead_after_secs must be at least 1".to_string(),
            ));
        }
        if self.interval_secs == 0 {
            return Err(AppError::Config(
                "cleanup.interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn mark_dead_after(&self) -> Duration {
        Duration::from_secs(self.mark_dead_after_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Maps job types to named status calculators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub calculator: BTreeMap<String, String>,
}

impl Default for StatusConfig {
    fn default() -> Self {
        let mut calculator = BTreeMap::new();
        calculator.insert(
            DEFAULT_CALCULATOR_ENTRY.to_string(),
            "warningOnLastJobFailed".to_string(),
        );
        Self { calculator }
    }
}

impl StatusConfig {
    /// Calculator key for a job type, falling back to the `default` entry
    pub fn calculator_for(&self, job_type: &str) -> Option<&str> {
        let wanted = normalize_key(job_type);
        self.calculator
            .iter()
            .find(|(key, _)| normalize_key(key) == wanted)
            .or_else(|| {
                self.calculator
                    .iter()
                    .find(|(key, _)| normalize_key(key) == DEFAULT_CALCULATOR_ENTRY)
            })
            .map(|(_, value)| value.as_str())
    }
}

/// Lower-case, spaces replaced by dashes
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace(' ', "-")
}
