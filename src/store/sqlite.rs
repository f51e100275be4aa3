//! SQLite-backed record store — the reference durable backend, built on
//! `sqlx::SqlitePool`.
//!
//! SQLite has no native TTL index, so `create_ttl_index` is implemented as
//! a periodic sweep task rather than a database-level expiry mechanism.

use crate::error::{Error, Result};
use crate::store::{HistoryPatch, HistoryRecord, InsertOutcome, RecordStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Minimum allowed TTL for a store's TTL index.
const MIN_TTL_SECONDS: u64 = 300;

/// A `sqlx::SqlitePool`-backed [`RecordStore`].
pub struct SqliteStore {
    pool: SqlitePool,
    table: String,
    sweeper_started: Arc<AtomicBool>,
}

impl SqliteStore {
    /// Connect to `url` (e.g. `sqlite::memory:` or a file path) and use
    /// `collection_name` as the backing table name.
    pub async fn connect(url: &str, collection_name: impl Into<String>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| Error::store(format!("failed to connect: {e}")))?;
        Self::from_pool(pool, collection_name)
    }

    /// Wrap an already-constructed pool.
    pub fn from_pool(pool: SqlitePool, collection_name: impl Into<String>) -> Result<Self> {
        let table = collection_name.into();
        if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') || table.is_empty() {
            return Err(Error::config(format!(
                "collection name '{table}' must be a non-empty alphanumeric/underscore identifier"
            )));
        }
        Ok(Self {
            pool,
            table,
            sweeper_started: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn ensure_table(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                intended_at TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                result TEXT,
                error TEXT
            )",
            table = self.table
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::store(format!("failed to create table: {e}")))?;
        Ok(())
    }

    fn is_duplicate_key(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db_err) => db_err
                .message()
                .to_ascii_uppercase()
                .contains("UNIQUE CONSTRAINT"),
            _ => false,
        }
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert_history(
        &self,
        name: &str,
        intended_at: DateTime<Utc>,
        started_at: DateTime<Utc>,
    ) -> Result<InsertOutcome> {
        let id = Uuid::new_v4();
        let sql = format!(
            "INSERT INTO {table} (id, name, intended_at, started_at) VALUES (?, ?, ?, ?)",
            table = self.table
        );
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .bind(name)
            .bind(intended_at.to_rfc3339())
            .bind(started_at.to_rfc3339())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted(id)),
            Err(err) if Self::is_duplicate_key(&err) => {
                debug!(name, %intended_at, "lease already held elsewhere");
                Ok(InsertOutcome::Duplicate)
            }
            Err(err) => Err(Error::store(format!("insert failed: {err}"))),
        }
    }

    async fn update_history(&self, id: Uuid, patch: HistoryPatch) -> Result<()> {
        let sql = format!(
            "UPDATE {table} SET finished_at = ?, result = ?, error = ? WHERE id = ?",
            table = self.table
        );
        sqlx::query(&sql)
            .bind(patch.finished_at.to_rfc3339())
            .bind(patch.result.map(|v| v.to_string()))
            .bind(patch.error)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::store(format!("update failed: {e}")))?;
        Ok(())
    }

    async fn find_recent(&self, name: &str, limit: usize) -> Result<Vec<HistoryRecord>> {
        let sql = format!(
            "SELECT id, name, intended_at, started_at, finished_at, result, error
             FROM {table} WHERE name = ? ORDER BY started_at DESC LIMIT ?",
            table = self.table
        );
        let rows = sqlx::query(&sql)
            .bind(name)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::store(format!("query failed: {e}")))?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn create_unique_index(&self) -> Result<()> {
        self.ensure_table().await?;
        let sql = format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {table}_intended_at_name_uniq
             ON {table} (intended_at, name)",
            table = self.table
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::store(format!("failed to create unique index: {e}")))?;
        Ok(())
    }

    async fn create_ttl_index(&self, ttl_seconds: u64) -> Result<()> {
        if ttl_seconds < MIN_TTL_SECONDS {
            warn!(ttl_seconds, "TTL below minimum, skipping TTL index entirely");
            return Err(Error::config(format!(
                "TTL {ttl_seconds} is below the minimum of {MIN_TTL_SECONDS} seconds"
            )));
        }

        if self.sweeper_started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let pool = self.pool.clone();
        let table = self.table.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let cutoff = Utc::now() - chrono::Duration::seconds(ttl_seconds as i64);
                let sql = format!("DELETE FROM {table} WHERE started_at < ?");
                if let Err(err) = sqlx::query(&sql)
                    .bind(cutoff.to_rfc3339())
                    .execute(&pool)
                    .await
                {
                    warn!(error = %err, "TTL sweep failed");
                }
            }
        });

        Ok(())
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<HistoryRecord> {
    let id: String = row.try_get("id").map_err(|e| Error::store(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| Error::store(e.to_string()))?;
    let intended_at: String = row
        .try_get("intended_at")
        .map_err(|e| Error::store(e.to_string()))?;
    let started_at: String = row
        .try_get("started_at")
        .map_err(|e| Error::store(e.to_string()))?;
    let finished_at: Option<String> = row
        .try_get("finished_at")
        .map_err(|e| Error::store(e.to_string()))?;
    let result: Option<String> = row.try_get("result").map_err(|e| Error::store(e.to_string()))?;
    let error: Option<String> = row.try_get("error").map_err(|e| Error::store(e.to_string()))?;

    Ok(HistoryRecord {
        id: Uuid::parse_str(&id).map_err(|e| Error::store(e.to_string()))?,
        name,
        intended_at: parse_rfc3339(&intended_at)?,
        started_at: parse_rfc3339(&started_at)?,
        finished_at: finished_at.as_deref().map(parse_rfc3339).transpose()?,
        result: result.and_then(|s| serde_json::from_str(&s).ok()),
        error,
    })
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::store(format!("invalid timestamp '{s}': {e}")))
}
