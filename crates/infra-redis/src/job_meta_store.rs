// Redis JobMetaStore Implementation

use crate::error::map_redis_error;
use async_trait::async_trait;
use overseer_core::domain::JobMeta;
use overseer_core::error::Result;
use overseer_core::port::JobMetaStore;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::{BTreeSet, HashMap};

/// One hash per job type (`p:meta:<type>`) plus the set of known types
/// (`p:job_types`). `create_value` is `HSETNX`, atomic on the server.
pub struct RedisJobMetaStore {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisJobMetaStore {
    pub fn new(conn: MultiplexedConnection, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    fn meta_key(&self, job_type: &str) -> String {
        format!("{}:meta:{}", self.prefix, job_type)
    }

    fn types_key(&self) -> String {
        format!("{}:job_types", self.prefix)
    }
}

#[async_trait]
impl JobMetaStore for RedisJobMetaStore {
    async fn get_value(&self, job_type: &str, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.hget(self.meta_key(job_type), key)
            .await
            .map_err(map_redis_error)
    }

    async fn set_value(
        &self,
        job_type: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<Option<String>> {
        let meta_key = self.meta_key(job_type);
        let mut pipe = redis::pipe();
        pipe.atomic().hget(&meta_key, key);
        match value {
            Some(value) => pipe.hset(&meta_key, key, value).ignore(),
            None => pipe.hdel(&meta_key, key).ignore(),
        };
        pipe.sadd(self.types_key(), job_type).ignore();

        let mut conn = self.conn.clone();
        let (previous,): (Option<String>,) = pipe
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(previous)
    }

    async fn create_value(&self, job_type: &str, key: &str, value: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let created: bool = conn
            .hset_nx(self.meta_key(job_type), key, value)
            .await
            .map_err(map_redis_error)?;
        conn.sadd::<_, _, ()>(self.types_key(), job_type)
            .await
            .map_err(map_redis_error)?;
        Ok(created)
    }

    async fn get_job_meta(&self, job_type: &str) -> Result<JobMeta> {
        let mut conn = self.conn.clone();
        let entries: HashMap<String, String> = conn
            .hgetall(self.meta_key(job_type))
            .await
            .map_err(map_redis_error)?;
        Ok(JobMeta::from_entries(job_type, entries))
    }

    async fn find_all_job_types(&self) -> Result<BTreeSet<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(self.types_key())
            .await
            .map_err(map_redis_error)
    }

    async fn delete_all(&self) -> Result<()> {
        let job_types = self.find_all_job_types().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for job_type in &job_types {
            pipe.del(self.meta_key(job_type)).ignore();
        }
        pipe.del(self.types_key()).ignore();

        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }
}
