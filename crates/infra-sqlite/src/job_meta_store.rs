// SQLite JobMetaStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use overseer_core::domain::JobMeta;
use overseer_core::error::Result;
use overseer_core::port::JobMetaStore;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::{BTreeSet, HashMap};

/// Meta entries in `job_meta`, keyed by (job_type, key).
///
/// `create_value` is a single `INSERT .. ON CONFLICT DO NOTHING`, so the
/// primary key decides the winner when several processes share the file.
pub struct SqliteJobMetaStore {
    pool: SqlitePool,
}

impl SqliteJobMetaStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn register_type(tx: &mut Transaction<'_, Sqlite>, job_type: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO job_types (job_type) VALUES (?)")
            .bind(job_type)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl JobMetaStore for SqliteJobMetaStore {
    async fn get_value(&self, job_type: &str, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT value FROM job_meta WHERE job_type = ? AND key = ?")
            .bind(job_type)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn set_value(
        &self,
        job_type: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<Option<String>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Self::register_type(&mut tx, job_type).await?;

        let previous: Option<String> =
            sqlx::query_scalar("SELECT value FROM job_meta WHERE job_type = ? AND key = ?")
                .bind(job_type)
                .bind(key)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

        match value {
            Some(value) => {
                sqlx::query(
                    r#"
                    INSERT INTO job_meta (job_type, key, value) VALUES (?, ?, ?)
                    ON CONFLICT(job_type, key) DO UPDATE SET value = excluded.value
                    "#,
                )
                .bind(job_type)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            }
            None => {
                sqlx::query("DELETE FROM job_meta WHERE job_type = ? AND key = ?")
                    .bind(job_type)
                    .bind(key)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(previous)
    }

    async fn create_value(&self, job_type: &str, key: &str, value: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Self::register_type(&mut tx, job_type).await?;

        let result = sqlx::query(
            "INSERT INTO job_meta (job_type, key, value) VALUES (?, ?, ?) ON CONFLICT(job_type, key) DO NOTHING",
        )
        .bind(job_type)
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_job_meta(&self, job_type: &str) -> Result<JobMeta> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM job_meta WHERE job_type = ?")
                .bind(job_type)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        let entries: HashMap<String, String> = rows.into_iter().collect();
        Ok(JobMeta::from_entries(job_type, entries))
    }

    async fn find_all_job_types(&self) -> Result<BTreeSet<String>> {
        let types: Vec<String> = sqlx::query_scalar(
            "SELECT job_type FROM job_types UNION SELECT job_type FROM job_meta",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(types.into_iter().collect())
    }

    async fn delete_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM job_meta")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM job_types")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)
    }
}
