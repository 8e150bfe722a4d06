// Job Definition - static descriptor supplied by job authors

use std::str::FromStr;
use std::time::Duration;

use crate::domain::error::{DomainError, Result};

/// When a job is triggered by the local scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSchedule {
    /// 6/7-field cron expression (seconds first)
    Cron(String),
    /// Delay between the end of one trigger cycle and the next
    FixedDelay(Duration),
    /// Only started on explicit request
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDefinition {
    pub job_type: String,
    pub job_name: String,
    pub description: String,
    pub schedule: JobSchedule,
    /// Restarts after a failed execution (0 = no retry)
    pub restarts: u32,
    pub retry_delay: Option<Duration>,
    /// Maximum age of the last execution before health turns WARNING
    pub max_age: Option<Duration>,
}

impl JobDefinition {
    pub fn manually_triggered(
        job_type: impl Into<String>,
        job_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            job_type: job_type.into(),
            job_name: job_name.into(),
            description: description.into(),
            schedule: JobSchedule::Manual,
            restarts: 0,
            retry_delay: None,
            max_age: None,
        }
    }

    pub fn fixed_delay(
        job_type: impl Into<String>,
        job_name: impl Into<String>,
        description: impl Into<String>,
        delay: Duration,
    ) -> Self {
        Self {
            schedule: JobSchedule::FixedDelay(delay),
            ..Self::manually_triggered(job_type, job_name, description)
        }
    }

    pub fn cron(
        job_type: impl Into<String>,
        job_name: impl Into<String>,
        description: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            schedule: JobSchedule::Cron(expression.into()),
            ..Self::manually_triggered(job_type, job_name, description)
        }
    }

    pub fn with_restarts(mut self, restarts: u32) -> Self {
        self.restarts = restarts;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.job_type.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "job type must not be empty".to_string(),
            ));
        }
        match &self.schedule {
            JobSchedule::Cron(expression) => {
                cron::Schedule::from_str(expression).map_err(|e| {
                    DomainError::ValidationError(format!(
                        "invalid cron expression '{}' for {}: {}",
                        expression, self.job_type, e
                    ))
                })?;
            }
            JobSchedule::FixedDelay(delay) if delay.is_zero() => {
                return Err(DomainError::ValidationError(format!(
                    "fixed delay of {} must be positive",
                    self.job_type
                )));
            }
            _ => {}
        }
        Ok(())
    }
}
