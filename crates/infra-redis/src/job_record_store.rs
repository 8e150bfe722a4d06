// Redis JobRecordStore Implementation

use crate::error::map_redis_error;
use async_trait::async_trait;
use overseer_core::domain::{JobMessage, JobRecord, JobStatus};
use overseer_core::error::{AppError, Result};
use overseer_core::port::JobRecordStore;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::str::FromStr;

/// Records as hashes, messages as JSON lists, listings through sorted sets.
///
/// Keys (with prefix `p`):
/// * `p:job:<id>` record fields
/// * `p:job:<id>:messages` message list
/// * `p:jobs` all ids scored by `started`
/// * `p:jobs:<type>` ids of one type scored by `started`
///
/// `ZREVRANGE` orders equal scores by member descending, which matches the
/// id tie-break of the other backends.
pub struct RedisJobRecordStore {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisJobRecordStore {
    pub fn new(conn: MultiplexedConnection, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    fn record_key(&self, id: &str) -> String {
        format!("{}:job:{}", self.prefix, id)
    }

    fn messages_key(&self, id: &str) -> String {
        format!("{}:job:{}:messages", self.prefix, id)
    }

    fn all_key(&self) -> String {
        format!("{}:jobs", self.prefix)
    }

    fn type_key(&self, job_type: &str) -> String {
        format!("{}:jobs:{}", self.prefix, job_type)
    }

    async fn load(&self, id: &str, with_messages: bool) -> Result<Option<JobRecord>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(self.record_key(id))
            .await
            .map_err(map_redis_error)?;
        if fields.is_empty() {
            return Ok(None);
        }
        let messages = if with_messages {
            let raw: Vec<String> = conn
                .lrange(self.messages_key(id), 0, -1)
                .await
                .map_err(map_redis_error)?;
            raw.iter()
                .map(|m| serde_json::from_str::<JobMessage>(m))
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };
        record_from_fields(&fields, messages).map(Some)
    }

    /// Load ids in order, skipping ids whose hash is already gone
    async fn load_all(&self, ids: Vec<String>, with_messages: bool) -> Result<Vec<JobRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.load(&id, with_messages).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn newest_ids(&self, key: String, max_count: Option<usize>) -> Result<Vec<String>> {
        let stop = match max_count {
            Some(0) => return Ok(Vec::new()),
            Some(n) => n as isize - 1,
            None => -1,
        };
        let mut conn = self.conn.clone();
        conn.zrevrange(key, 0, stop).await.map_err(map_redis_error)
    }

    async fn started_of(&self, id: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let started: Option<String> = conn
            .hget(self.record_key(id), "started")
            .await
            .map_err(map_redis_error)?;
        match started {
            Some(started) => parse_millis("started", &started),
            None => Err(AppError::NotFound(format!("job record {}", id))),
        }
    }
}

#[async_trait]
impl JobRecordStore for RedisJobRecordStore {
    async fn create_or_update(&self, record: &JobRecord) -> Result<()> {
        let record_key = self.record_key(&record.id);
        let messages_key = self.messages_key(&record.id);
        let messages = record
            .messages
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut fields = vec![
            ("id", record.id.clone()),
            ("job_type", record.job_type.clone()),
            ("started", record.started.to_string()),
            ("last_updated", record.last_updated.to_string()),
            ("status", record.status.to_string()),
            ("hostname", record.hostname.clone()),
        ];
        if let Some(stopped) = record.stopped {
            fields.push(("stopped", stopped.to_string()));
        }

        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(&record_key)
            .ignore()
            .hset_multiple(&record_key, &fields[..])
            .ignore()
            .del(&messages_key)
            .ignore();
        if !messages.is_empty() {
            pipe.rpush(&messages_key, messages).ignore();
        }
        pipe.zadd(self.all_key(), &record.id, record.started)
            .ignore()
            .zadd(self.type_key(&record.job_type), &record.id, record.started)
            .ignore();

        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn find_one(&self, id: &str) -> Result<Option<JobRecord>> {
        self.load(id, true).await
    }

    async fn find_all(&self) -> Result<Vec<JobRecord>> {
        let ids = self.newest_ids(self.all_key(), None).await?;
        self.load_all(ids, true).await
    }

    async fn find_by_type(&self, job_type: &str) -> Result<Vec<JobRecord>> {
        let ids = self.newest_ids(self.type_key(job_type), None).await?;
        self.load_all(ids, true).await
    }

    async fn find_latest(&self, max_count: usize) -> Result<Vec<JobRecord>> {
        let ids = self.newest_ids(self.all_key(), Some(max_count)).await?;
        self.load_all(ids, true).await
    }

    async fn find_latest_by_type(
        &self,
        job_type: &str,
        max_count: usize,
    ) -> Result<Vec<JobRecord>> {
        let ids = self
            .newest_ids(self.type_key(job_type), Some(max_count))
            .await?;
        self.load_all(ids, true).await
    }

    async fn find_running_without_update_since(&self, timestamp: i64) -> Result<Vec<JobRecord>> {
        let ids = self.newest_ids(self.all_key(), None).await?;
        let mut stale = Vec::new();
        for record in self.load_all(ids, false).await? {
            if record.is_running() && record.last_updated < timestamp {
                if let Some(full) = self.load(&record.id, true).await? {
                    stale.push(full);
                }
            }
        }
        Ok(stale)
    }

    async fn append_message(&self, id: &str, message: &JobMessage) -> Result<()> {
        let started = self.started_of(id).await?;
        let payload = serde_json::to_string(message)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset(self.record_key(id), "last_updated", message.timestamp.max(started))
            .ignore()
            .rpush(self.messages_key(id), payload)
            .ignore();

        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn set_status(&self, id: &str, status: JobStatus) -> Result<()> {
        // fails with NotFound for unknown ids
        self.started_of(id).await?;
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(self.record_key(id), "status", status.to_string())
            .await
            .map_err(map_redis_error)
    }

    async fn set_last_updated(&self, id: &str, timestamp: i64) -> Result<()> {
        let started = self.started_of(id).await?;
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(self.record_key(id), "last_updated", timestamp.max(started))
            .await
            .map_err(map_redis_error)
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let job_type: Option<String> = conn
            .hget(self.record_key(id), "job_type")
            .await
            .map_err(map_redis_error)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(self.record_key(id))
            .ignore()
            .del(self.messages_key(id))
            .ignore()
            .zrem(self.all_key(), id)
            .ignore();
        if let Some(job_type) = job_type {
            pipe.zrem(self.type_key(&job_type), id).ignore();
        }
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn remove_if_stopped(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let stopped: Option<String> = conn
            .hget(self.record_key(id), "stopped")
            .await
            .map_err(map_redis_error)?;
        if stopped.is_none() {
            return Ok(false);
        }
        self.remove(id).await?;
        Ok(true)
    }

    async fn count(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        conn.zcard(self.all_key()).await.map_err(map_redis_error)
    }

    async fn delete_all(&self) -> Result<()> {
        for id in self.newest_ids(self.all_key(), None).await? {
            self.remove(&id).await?;
        }
        Ok(())
    }

    async fn find_all_without_messages(&self) -> Result<Vec<JobRecord>> {
        let ids = self.newest_ids(self.all_key(), None).await?;
        self.load_all(ids, false).await
    }
}

fn parse_millis(field: &str, value: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|e| AppError::Repository(format!("invalid {} '{}': {}", field, value, e)))
}

fn required<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a String> {
    fields
        .get(name)
        .ok_or_else(|| AppError::Repository(format!("job record without {}", name)))
}

fn record_from_fields(
    fields: &HashMap<String, String>,
    messages: Vec<JobMessage>,
) -> Result<JobRecord> {
    Ok(JobRecord {
        id: required(fields, "id")?.clone(),
        job_type: required(fields, "job_type")?.clone(),
        started: parse_millis("started", required(fields, "started")?)?,
        last_updated: parse_millis("last_updated", required(fields, "last_updated")?)?,
        stopped: fields
            .get("stopped")
            .map(|s| parse_millis("stopped", s))
            .transpose()?,
        status: JobStatus::from_str(required(fields, "status")?)?,
        hostname: required(fields, "hostname")?.clone(),
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect;

    /// Tests run only against a live server named by REDIS_URL
    async fn setup_store() -> Option<RedisJobRecordStore> {
        let url = std::env::var("REDIS_URL").ok()?;
        let conn = connect(&url).await.unwrap();
        let prefix = format!("overseer-test-{}", uuid::Uuid::new_v4());
        Some(RedisJobRecordStore::new(conn, prefix))
    }

    fn record(id: &str, job_type: &str, started: i64) -> JobRecord {
        JobRecord::new(id, job_type, started, "host-a")
    }

    #[test]
    fn test_record_from_fields() {
        let mut fields = HashMap::new();
        for (k, v) in [
            ("id", "a"),
            ("job_type", "IMPORT"),
            ("started", "1000"),
            ("last_updated", "1500"),
            ("stopped", "2000"),
            ("status", "DEAD"),
            ("hostname", "host-a"),
        ] {
            fields.insert(k.to_string(), v.to_string());
        }

        let parsed = record_from_fields(&fields, Vec::new()).unwrap();
        assert_eq!(parsed.stopped, Some(2_000));
        assert_eq!(parsed.status, JobStatus::Dead);

        fields.remove("hostname");
        assert!(matches!(
            record_from_fields(&fields, Vec::new()),
            Err(AppError::Repository(_))
        ));
    }

    #[tokio::test]
    async fn test_round_trip_and_listing() {
        let Some(store) = setup_store().await else {
            return;
        };
        let mut a = record("a", "IMPORT", 1_000);
        a.messages.push(JobMessage::info("hello", 1_001));
        a.stop(1_500).unwrap();
        store.create_or_update(&a).await.unwrap();
        store.create_or_update(&record("b", "EXPORT", 3_000)).await.unwrap();
        store.create_or_update(&record("c", "IMPORT", 2_000)).await.unwrap();

        assert_eq!(store.find_one("a").await.unwrap(), Some(a));
        let ids: Vec<String> = store
            .find_by_type("IMPORT")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(store.find_latest(1).await.unwrap()[0].id, "b");
        assert_eq!(store.count().await.unwrap(), 3);

        assert!(store.remove_if_stopped("a").await.unwrap());
        assert!(!store.remove_if_stopped("b").await.unwrap());
        store.delete_all().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_append_message_and_updates() {
        let Some(store) = setup_store().await else {
            return;
        };
        store.create_or_update(&record("a", "IMPORT", 1_000)).await.unwrap();

        store
            .append_message("a", &JobMessage::error("boom", 1_200))
            .await
            .unwrap();
        store.set_status("a", JobStatus::Error).await.unwrap();

        let found = store.find_one("a").await.unwrap().unwrap();
        assert_eq!(found.messages.len(), 1);
        assert_eq!(found.last_updated, 1_200);
        assert_eq!(found.status, JobStatus::Error);

        let stale = store.find_running_without_update_since(5_000).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert!(matches!(
            store.set_last_updated("nope", 1).await,
            Err(AppError::NotFound(_))
        ));
        store.delete_all().await.unwrap();
    }
}
