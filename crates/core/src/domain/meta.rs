// Job Meta Domain Model - per-job-type control state

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Keys starting with this prefix are reserved for control markers
pub const RESERVED_KEY_PREFIX: &str = "_o_";

/// Running marker; holds the id of the executing job
pub const KEY_RUNNING: &str = "_o_running";

/// Disabled marker; holds the operator comment
pub const KEY_DISABLED: &str = "_o_disabled";

/// Snapshot of the control-plane state of one job type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMeta {
    pub job_type: String,
    pub running_job_id: Option<String>,
    pub disabled: bool,
    pub disabled_comment: String,
    pub meta: BTreeMap<String, String>,
}

impl JobMeta {
    /// Empty meta for a job type that has never been written
    pub fn empty(job_type: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            running_job_id: None,
            disabled: false,
            disabled_comment: String::new(),
            meta: BTreeMap::new(),
        }
    }

    /// Build from the raw key/value entries stored for a job type
    pub fn from_entries(job_type: impl Into<String>, entries: HashMap<String, String>) -> Self {
        let mut meta = Self::empty(job_type);
        for (key, value) in entries {
            if key == KEY_RUNNING {
                meta.running_job_id = Some(value);
            } else if key == KEY_DISABLED {
                meta.disabled = true;
                meta.disabled_comment = value;
            } else if !key.starts_with(RESERVED_KEY_PREFIX) {
                meta.meta.insert(key, value);
            }
        }
        meta
    }

    pub fn is_running(&self) -> bool {
        self.running_job_id.is_some()
    }
}

/// A job type whose running marker is set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunningJob {
    pub job_id: String,
    pub job_type: String,
}

/// A job type disabled by an operator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DisabledJob {
    pub job_type: String,
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_entries_filters_reserved_keys() {
        let mut entries = HashMap::new();
        entries.insert(KEY_RUNNING.to_string(), "job-1".to_string());
        entries.insert(KEY_DISABLED.to_string(), "maintenance".to_string());
        entries.insert("_o_internal".to_string(), "x".to_string());
        entries.insert("last_offset".to_string(), "42".to_string());

        let meta = JobMeta::from_entries("IMPORT", entries);

        assert!(meta.is_running());
        assert_eq!(meta.running_job_id.as_deref(), Some("job-1"));
        assert!(meta.disabled);
        assert_eq!(meta.disabled_comment, "maintenance");
        assert_eq!(meta.meta.len(), 1);
        assert_eq!(meta.meta.get("last_offset").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_empty_meta() {
        let meta = JobMeta::empty("IMPORT");
        assert!(!meta.is_running());
        assert!(!meta.disabled);
        assert!(meta.meta.is_empty());
    }
}
