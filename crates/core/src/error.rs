// Central Error Type for the Application

use thiserror::Error;

/// Why a job was not admitted to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    Disabled,
    AlreadyRunning,
    BlockedBy(String),
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::Disabled => write!(f, "disabled"),
            BlockReason::AlreadyRunning => write!(f, "already running"),
            BlockReason::BlockedBy(job_type) => write!(f, "blocked by running job {}", job_type),
        }
    }
}

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Job '{job_type}' blocked: {reason}")]
    JobBlocked { job_type: String, reason: BlockReason },

    #[error("Execution error: {0}")]
    Execution(#[from] crate::port::ExecutionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn blocked(job_type: impl Into<String>, reason: BlockReason) -> Self {
        AppError::JobBlocked {
            job_type: job_type.into(),
            reason,
        }
    }

    /// Expected, recoverable rejection (not a failure)
    pub fn is_blocked(&self) -> bool {
        matches!(self, AppError::JobBlocked { .. })
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: driver errors (sqlx, redis) are converted in the infra crates
// by mapping to AppError::Repository(String)
