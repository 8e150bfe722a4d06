// In-memory Job Meta Store

use crate::domain::JobMeta;
use crate::error::Result;
use crate::port::JobMetaStore;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::Mutex;

/// Key/value entries per job type behind a single mutex.
///
/// `create_value` checks and inserts under the same guard, which is the
/// in-process equivalent of a conditional write.
#[derive(Default)]
pub struct InMemJobMetaStore {
    entries: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl InMemJobMetaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobMetaStore for InMemJobMetaStore {
    async fn get_value(&self, job_type: &str, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(job_type).and_then(|m| m.get(key)).cloned())
    }

    async fn set_value(
        &self,
        job_type: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        let values = entries.entry(job_type.to_string()).or_default();
        Ok(match value {
            Some(v) => values.insert(key.to_string(), v.to_string()),
            None => values.remove(key),
        })
    }

    async fn create_value(&self, job_type: &str, key: &str, value: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let values = entries.entry(job_type.to_string()).or_default();
        if values.contains_key(key) {
            return Ok(false);
        }
        values.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn get_job_meta(&self, job_type: &str) -> Result<JobMeta> {
        let entries = self.entries.lock().await;
        Ok(match entries.get(job_type) {
            Some(values) => JobMeta::from_entries(job_type, values.clone()),
            None => JobMeta::empty(job_type),
        })
    }

    async fn find_all_job_types(&self) -> Result<BTreeSet<String>> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }

    async fn delete_all(&self) -> Result<()> {
        self.entries.lock().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::KEY_RUNNING;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_create_value_only_once() {
        let store = InMemJobMetaStore::new();
        assert!(store.create_value("IMPORT", "k", "first").await.unwrap());
        assert!(!store.create_value("IMPORT", "k", "second").await.unwrap());
        assert_eq!(
            store.get_value("IMPORT", "k").await.unwrap().as_deref(),
            Some("first")
        );
    }

    #[tokio::test]
    async fn test_concurrent_create_value_has_one_winner() {
        let store = Arc::new(InMemJobMetaStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .create_value("IMPORT", KEY_RUNNING, &format!("job-{}", i))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_set_value_returns_previous_and_deletes() {
        let store = InMemJobMetaStore::new();
        assert_eq!(store.set_value("IMPORT", "k", Some("a")).await.unwrap(), None);
        assert_eq!(
            store.set_value("IMPORT", "k", Some("b")).await.unwrap().as_deref(),
            Some("a")
        );
        assert_eq!(
            store.set_value("IMPORT", "k", None).await.unwrap().as_deref(),
            Some("b")
        );
        assert_eq!(store.get_value("IMPORT", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_job_type_known_after_delete() {
        let store = InMemJobMetaStore::new();
        store.set_value("EXPORT", "k", None).await.unwrap();
        let types = store.find_all_job_types().await.unwrap();
        assert!(types.contains("EXPORT"));
    }

    #[tokio::test]
    async fn test_running_and_disabled_markers() {
        let store = InMemJobMetaStore::new();
        assert!(store.set_running_job("IMPORT", "job-1").await.unwrap());
        store.disable("IMPORT", None).await.unwrap();
        store.set_value("IMPORT", "offset", Some("7")).await.unwrap();

        let meta = store.get_job_meta("IMPORT").await.unwrap();
        assert_eq!(meta.running_job_id.as_deref(), Some("job-1"));
        assert!(meta.disabled);
        assert_eq!(meta.disabled_comment, "");
        assert_eq!(meta.meta.len(), 1);

        store.clear_running_job("IMPORT").await.unwrap();
        store.clear_running_job("IMPORT").await.unwrap();
        store.enable("IMPORT").await.unwrap();
        let meta = store.get_job_meta("IMPORT").await.unwrap();
        assert!(!meta.is_running());
        assert!(!meta.disabled);
    }
}
