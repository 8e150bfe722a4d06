// Mutex Groups - job types that must never run concurrently

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Named set of mutually exclusive job types (static configuration)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMutexGroup {
    pub name: String,
    pub job_types: BTreeSet<String>,
}

impl JobMutexGroup {
    pub fn new<I, S>(name: impl Into<String>, job_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            job_types: job_types.into_iter().map(Into::into).collect(),
        }
    }
}

/// Resolves the set of job types that conflict with a given type.
///
/// The per-type union is precomputed, so lookups are a single map read.
#[derive(Debug, Clone, Default)]
pub struct JobMutexGroups {
    groups: Vec<JobMutexGroup>,
    index: HashMap<String, BTreeSet<String>>,
}

impl JobMutexGroups {
    pub fn new(groups: Vec<JobMutexGroup>) -> Self {
        let mut index: HashMap<String, BTreeSet<String>> = HashMap::new();
        for group in &groups {
            for job_type in &group.job_types {
                index
                    .entry(job_type.clone())
                    .or_default()
                    .extend(group.job_types.iter().cloned());
            }
        }
        Self { groups, index }
    }

    pub fn groups(&self) -> &[JobMutexGroup] {
        &self.groups
    }

    /// All job types that must not run concurrently with `job_type`,
    /// always including `job_type` itself.
    pub fn mutex_types_for(&self, job_type: &str) -> BTreeSet<String> {
        let mut result = self.index.get(job_type).cloned().unwrap_or_default();
        result.insert(job_type.to_string());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(types: &[&str]) -> BTreeSet<String> {
        types.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_configuration_yields_self() {
        let groups = JobMutexGroups::default();
        assert_eq!(groups.mutex_types_for("IMPORT"), set(&["IMPORT"]));
    }

    #[test]
    fn test_single_group() {
        let groups = JobMutexGroups::new(vec![JobMutexGroup::new("io", ["IMPORT", "EXPORT"])]);
        assert_eq!(groups.mutex_types_for("IMPORT"), set(&["IMPORT", "EXPORT"]));
        assert_eq!(groups.mutex_types_for("EXPORT"), set(&["IMPORT", "EXPORT"]));
        assert_eq!(groups.mutex_types_for("REPORT"), set(&["REPORT"]));
    }

    #[test]
    fn test_overlapping_groups_are_unioned() {
        let groups = JobMutexGroups::new(vec![
            JobMutexGroup::new("a", ["IMPORT", "EXPORT"]),
            JobMutexGroup::new("b", ["EXPORT", "REINDEX"]),
        ]);
        assert_eq!(
            groups.mutex_types_for("EXPORT"),
            set(&["IMPORT", "EXPORT", "REINDEX"])
        );
        // only groups that contain the type itself contribute
        assert_eq!(groups.mutex_types_for("IMPORT"), set(&["IMPORT", "EXPORT"]));
    }
}
