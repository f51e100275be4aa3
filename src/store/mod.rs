//! The record store contract and its concrete backends.
//!
//! `RecordStore` is an `async_trait` object so the Coordinator and Registry
//! depend on the abstract contract rather than a concrete SQL driver.

pub mod memory;
#[cfg(feature = "sqlite-store")]
pub mod sqlite;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single row of the coordination history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Opaque record identity.
    pub id: Uuid,
    /// Job name.
    pub name: String,
    /// The scheduled instant this firing was intended for, second precision.
    pub intended_at: DateTime<Utc>,
    /// When this instance began executing the firing.
    pub started_at: DateTime<Utc>,
    /// When execution finished, if it has.
    pub finished_at: Option<DateTime<Utc>>,
    /// The job's return value, on success.
    pub result: Option<serde_json::Value>,
    /// The job's stringified error, on failure.
    pub error: Option<String>,
}

/// A partial update applied by `update_history` after a firing completes.
#[derive(Debug, Clone)]
pub struct HistoryPatch {
    /// Completion timestamp.
    pub finished_at: DateTime<Utc>,
    /// The job's return value, on success.
    pub result: Option<serde_json::Value>,
    /// The job's stringified error, on failure.
    pub error: Option<String>,
}

/// Result of attempting to acquire a lease via `insert_history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// This instance won the race for `(name, intended_at)`.
    Inserted(Uuid),
    /// Another instance already holds this firing's lease.
    Duplicate,
}

/// The abstract record-store contract. Any backend honoring atomic
/// uniqueness on `(name, intended_at)` is acceptable; `cronsync`
/// treats the store as an external collaborator and ships two reference
/// implementations ([`memory::MemoryStore`] and, behind the `sqlite-store`
/// feature, [`sqlite::SqliteStore`]).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Atomically insert a lease row, or report that one already exists for
    /// `(name, intended_at)`.
    async fn insert_history(
        &self,
        name: &str,
        intended_at: DateTime<Utc>,
        started_at: DateTime<Utc>,
    ) -> Result<InsertOutcome>;

    /// Apply a partial update to a previously inserted record.
    async fn update_history(&self, id: Uuid, patch: HistoryPatch) -> Result<()>;

    /// Fetch up to `limit` most-recent rows for `name`, newest `started_at` first.
    async fn find_recent(&self, name: &str, limit: usize) -> Result<Vec<HistoryRecord>>;

    /// Idempotently ensure the unique `(intended_at, name)` index exists.
    async fn create_unique_index(&self) -> Result<()>;

    /// Idempotently ensure a TTL expiry mechanism on `started_at` exists,
    /// expiring rows `ttl_seconds` after they were started.
    async fn create_ttl_index(&self, ttl_seconds: u64) -> Result<()>;
}
