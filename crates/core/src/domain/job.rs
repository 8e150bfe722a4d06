// Job Record Domain Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::{DomainError, Result};

/// Job ID (UUID v4 unless injected)
pub type JobId = String;

/// Logical category of recurring background work (e.g. "IMPORT")
pub type JobType = String;

/// Outcome of a job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Ok,
    Skipped,
    Error,
    Dead,
}

impl JobStatus {
    /// ERROR and DEAD count as failed executions
    pub fn is_failure(&self) -> bool {
        matches!(self, JobStatus::Error | JobStatus::Dead)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Ok => write!(f, "OK"),
            JobStatus::Skipped => write!(f, "SKIPPED"),
            JobStatus::Error => write!(f, "ERROR"),
            JobStatus::Dead => write!(f, "DEAD"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OK" => Ok(JobStatus::Ok),
            "SKIPPED" => Ok(JobStatus::Skipped),
            "ERROR" => Ok(JobStatus::Error),
            "DEAD" => Ok(JobStatus::Dead),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Severity of a job message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageLevel::Info => write!(f, "INFO"),
            MessageLevel::Warning => write!(f, "WARNING"),
            MessageLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for MessageLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "INFO" => Ok(MessageLevel::Info),
            "WARNING" => Ok(MessageLevel::Warning),
            "ERROR" => Ok(MessageLevel::Error),
            other => Err(DomainError::UnknownLevel(other.to_string())),
        }
    }
}

/// Human-readable message attached to a job record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    pub level: MessageLevel,
    pub message: String,
    pub timestamp: i64, // epoch ms
}

impl JobMessage {
    pub fn new(level: MessageLevel, message: impl Into<String>, timestamp: i64) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp,
        }
    }

    pub fn info(message: impl Into<String>, timestamp: i64) -> Self {
        Self::new(MessageLevel::Info, message, timestamp)
    }

    pub fn warning(message: impl Into<String>, timestamp: i64) -> Self {
        Self::new(MessageLevel::Warning, message, timestamp)
    }

    pub fn error(message: impl Into<String>, timestamp: i64) -> Self {
        Self::new(MessageLevel::Error, message, timestamp)
    }
}

/// One execution instance of a job type.
///
/// All timestamps are epoch milliseconds, the resolution every backend
/// persists with, so records compare equal after a store round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub job_type: JobType,
    pub started: i64,
    pub last_updated: i64,
    pub stopped: Option<i64>,
    pub status: JobStatus,
    pub hostname: String,
    pub messages: Vec<JobMessage>,
}

impl JobRecord {
    /// Create a running record
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `job_type` - Job type
    /// * `started` - Start timestamp in epoch ms (injected, not system time)
    /// * `hostname` - Host executing the job
    pub fn new(
        id: impl Into<String>,
        job_type: impl Into<String>,
        started: i64,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            job_type: job_type.into(),
            started,
            last_updated: started,
            stopped: None,
            status: JobStatus::Ok,
            hostname: hostname.into(),
            messages: Vec::new(),
        }
    }

    /// A record without `stopped` is still running
    pub fn is_stopped(&self) -> bool {
        self.stopped.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.stopped.is_none()
    }

    /// Bump `last_updated`, never moving it before `started`
    pub fn touch(&mut self, now_millis: i64) {
        self.last_updated = now_millis.max(self.started);
    }

    /// Transition to stopped with explicit timestamp
    pub fn stop(&mut self, now_millis: i64) -> Result<()> {
        if let Some(stopped) = self.stopped {
            return Err(DomainError::InvalidStateTransition {
                from: format!("STOPPED@{}", stopped),
                to: "STOPPED".to_string(),
            });
        }
        let at = now_millis.max(self.started);
        self.stopped = Some(at);
        self.last_updated = at;
        Ok(())
    }

    /// Force-stop a record whose owner stopped reporting
    pub fn mark_dead(&mut self, now_millis: i64) {
        let at = now_millis.max(self.started);
        self.status = JobStatus::Dead;
        self.stopped = Some(at);
        self.last_updated = at;
    }

    /// Copy without message history (cheap listings for sweepers)
    pub fn without_messages(&self) -> Self {
        Self {
            messages: Vec::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_running_ok() {
        let record = JobRecord::new("id-1", "IMPORT", 1_000, "host-a");
        assert!(record.is_running());
        assert_eq!(record.status, JobStatus::Ok);
        assert_eq!(record.last_updated, 1_000);
    }

    #[test]
    fn test_stop_twice_is_rejected() {
        let mut record = JobRecord::new("id-1", "IMPORT", 1_000, "host-a");
        record.stop(2_000).unwrap();
        assert_eq!(record.stopped, Some(2_000));
        assert!(record.stop(3_000).is_err());
    }

    #[test]
    fn test_stop_never_precedes_start() {
        let mut record = JobRecord::new("id-1", "IMPORT", 5_000, "host-a");
        record.stop(4_000).unwrap();
        assert_eq!(record.stopped, Some(5_000));
        assert!(record.last_updated >= record.started);
    }

    #[test]
    fn test_touch_never_precedes_start() {
        let mut record = JobRecord::new("id-1", "IMPORT", 1_000, "host-a");
        record.touch(500);
        assert_eq!(record.last_updated, 1_000);
        record.touch(2_000);
        assert_eq!(record.last_updated, 2_000);
    }

    #[test]
    fn test_without_messages() {
        let mut record = JobRecord::new("id-1", "IMPORT", 1_000, "host-a");
        record.messages.push(JobMessage::error("boom", 2_000));
        let stripped = record.without_messages();
        assert!(stripped.messages.is_empty());
        assert_eq!(stripped.id, record.id);
    }

    #[test]
    fn test_mark_dead() {
        let mut record = JobRecord::new("id-1", "IMPORT", 1_000, "host-a");
        record.mark_dead(9_000);
        assert_eq!(record.status, JobStatus::Dead);
        assert_eq!(record.stopped, Some(9_000));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("DEAD".parse::<JobStatus>().unwrap(), JobStatus::Dead);
        assert!("RUNNING".parse::<JobStatus>().is_err());
        assert_eq!(JobStatus::Skipped.to_string(), "SKIPPED");
    }

    #[test]
    fn test_serde_uses_screaming_case() {
        let json = serde_json::to_string(&JobStatus::Skipped).unwrap();
        assert_eq!(json, "\"SKIPPED\"");
    }
}
