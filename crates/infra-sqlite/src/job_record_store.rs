// SQLite JobRecordStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use overseer_core::domain::{JobMessage, JobRecord, JobStatus, MessageLevel};
use overseer_core::error::{AppError, Result};
use overseer_core::port::JobRecordStore;
use sqlx::SqlitePool;
use std::str::FromStr;

const SELECT_JOBS: &str =
    "SELECT id, job_type, started, last_updated, stopped, status, hostname FROM jobs";
const ORDER_NEWEST_FIRST: &str = "ORDER BY started DESC, id DESC";

pub struct SqliteJobRecordStore {
    pool: SqlitePool,
}

impl SqliteJobRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn messages_of(&self, job_id: &str) -> Result<Vec<JobMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT level, message, timestamp FROM job_messages WHERE job_id = ? ORDER BY seq",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        rows.into_iter().map(MessageRow::into_message).collect()
    }

    async fn with_messages(&self, rows: Vec<JobRow>) -> Result<Vec<JobRecord>> {
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let messages = self.messages_of(&row.id).await?;
            records.push(row.into_record(messages)?);
        }
        Ok(records)
    }

    async fn query_records(&self, sql: &str, binds: &[Bind<'_>]) -> Result<Vec<JobRow>> {
        let mut query = sqlx::query_as::<_, JobRow>(sql);
        for bind in binds {
            query = match bind {
                Bind::Text(value) => query.bind(*value),
                Bind::Int(value) => query.bind(*value),
            };
        }
        query.fetch_all(&self.pool).await.map_err(map_sqlx_error)
    }

    /// Fail with NotFound unless the update touched a row
    fn require_row(id: &str, rows_affected: u64) -> Result<()> {
        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("job record {}", id)));
        }
        Ok(())
    }
}

enum Bind<'a> {
    Text(&'a str),
    Int(i64),
}

#[async_trait]
impl JobRecordStore for SqliteJobRecordStore {
    async fn create_or_update(&self, record: &JobRecord) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, job_type, started, last_updated, stopped, status, hostname)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                job_type = excluded.job_type,
                started = excluded.started,
                last_updated = excluded.last_updated,
                stopped = excluded.stopped,
                status = excluded.status,
                hostname = excluded.hostname
            "#,
        )
        .bind(&record.id)
        .bind(&record.job_type)
        .bind(record.started)
        .bind(record.last_updated)
        .bind(record.stopped)
        .bind(record.status.to_string())
        .bind(&record.hostname)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM job_messages WHERE job_id = ?")
            .bind(&record.id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        for (seq, message) in record.messages.iter().enumerate() {
            sqlx::query(
                "INSERT INTO job_messages (job_id, seq, level, message, timestamp) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&record.id)
            .bind(seq as i64)
            .bind(message.level.to_string())
            .bind(&message.message)
            .bind(message.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn find_one(&self, id: &str) -> Result<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>(&format!("{} WHERE id = ?", SELECT_JOBS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        match row {
            Some(row) => {
                let messages = self.messages_of(&row.id).await?;
                Ok(Some(row.into_record(messages)?))
            }
            None => Ok(None),
        }
    }

    async fn find_all(&self) -> Result<Vec<JobRecord>> {
        let rows = self
            .query_records(&format!("{} {}", SELECT_JOBS, ORDER_NEWEST_FIRST), &[])
            .await?;
        self.with_messages(rows).await
    }

    async fn find_by_type(&self, job_type: &str) -> Result<Vec<JobRecord>> {
        let rows = self
            .query_records(
                &format!("{} WHERE job_type = ? {}", SELECT_JOBS, ORDER_NEWEST_FIRST),
                &[Bind::Text(job_type)],
            )
            .await?;
        self.with_messages(rows).await
    }

    async fn find_latest(&self, max_count: usize) -> Result<Vec<JobRecord>> {
        let rows = self
            .query_records(
                &format!("{} {} LIMIT ?", SELECT_JOBS, ORDER_NEWEST_FIRST),
                &[Bind::Int(max_count as i64)],
            )
            .await?;
        self.with_messages(rows).await
    }

    async fn find_latest_by_type(
        &self,
        job_type: &str,
        max_count: usize,
    ) -> Result<Vec<JobRecord>> {
        let rows = self
            .query_records(
                &format!(
                    "{} WHERE job_type = ? {} LIMIT ?",
                    SELECT_JOBS, ORDER_NEWEST_FIRST
                ),
                &[Bind::Text(job_type), Bind::Int(max_count as i64)],
            )
            .await?;
        self.with_messages(rows).await
    }

    async fn find_running_without_update_since(&self, timestamp: i64) -> Result<Vec<JobRecord>> {
        let rows = self
            .query_records(
                &format!(
                    "{} WHERE stopped IS NULL AND last_updated < ? {}",
                    SELECT_JOBS, ORDER_NEWEST_FIRST
                ),
                &[Bind::Int(timestamp)],
            )
            .await?;
        self.with_messages(rows).await
    }

    async fn append_message(&self, id: &str, message: &JobMessage) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let updated = sqlx::query("UPDATE jobs SET last_updated = MAX(?, started) WHERE id = ?")
            .bind(message.timestamp)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        Self::require_row(id, updated.rows_affected())?;

        sqlx::query(
            r#"
            INSERT INTO job_messages (job_id, seq, level, message, timestamp)
            SELECT ?, COALESCE(MAX(seq), -1) + 1, ?, ?, ? FROM job_messages WHERE job_id = ?
            "#,
        )
        .bind(id)
        .bind(message.level.to_string())
        .bind(&message.message)
        .bind(message.timestamp)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn set_status(&self, id: &str, status: JobStatus) -> Result<()> {
        let result = sqlx::query("UPDATE jobs SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Self::require_row(id, result.rows_affected())
    }

    async fn set_last_updated(&self, id: &str, timestamp: i64) -> Result<()> {
        let result = sqlx::query("UPDATE jobs SET last_updated = MAX(?, started) WHERE id = ?")
            .bind(timestamp)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Self::require_row(id, result.rows_affected())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        // messages follow via ON DELETE CASCADE
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn remove_if_stopped(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ? AND stopped IS NOT NULL")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(count as u64)
    }

    async fn delete_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM job_messages")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM jobs")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn find_all_without_messages(&self) -> Result<Vec<JobRecord>> {
        self.query_records(&format!("{} {}", SELECT_JOBS, ORDER_NEWEST_FIRST), &[])
            .await?
            .into_iter()
            .map(|row| row.into_record(Vec::new()))
            .collect()
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    job_type: String,
    started: i64,
    last_updated: i64,
    stopped: Option<i64>,
    status: String,
    hostname: String,
}

impl JobRow {
    fn into_record(self, messages: Vec<JobMessage>) -> Result<JobRecord> {
        Ok(JobRecord {
            status: JobStatus::from_str(&self.status)?,
            id: self.id,
            job_type: self.job_type,
            started: self.started,
            last_updated: self.last_updated,
            stopped: self.stopped,
            hostname: self.hostname,
            messages,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    level: String,
    message: String,
    timestamp: i64,
}

impl MessageRow {
    fn into_message(self) -> Result<JobMessage> {
        Ok(JobMessage::new(
            MessageLevel::from_str(&self.level)?,
            self.message,
            self.timestamp,
        ))
    }
}
