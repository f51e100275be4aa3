//! In-process record store — sufficient for tests and single-instance
//! deployments. A full [`RecordStore`] impl with a manual unique-key check
//! standing in for a database's unique index.

use crate::error::{Error, Result};
use crate::store::{HistoryPatch, HistoryRecord, InsertOutcome, RecordStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use uuid::Uuid;

/// A `Mutex`-guarded in-memory history table shared across however many
/// [`MemoryStore`] handles reference it — `Clone`s of a `MemoryStore` share
/// the same table, the way multiple `Registry` instances in the pack's
/// `collectionCache` pattern share one underlying collection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<HistoryRecord>>,
    ttl_seconds: Mutex<Option<u64>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn purge_expired(&self, now: DateTime<Utc>) {
        let ttl = *self.ttl_seconds.lock().expect("lock poisoned");
        if let Some(ttl) = ttl {
            let mut records = self.records.lock().expect("lock poisoned");
            records.retain(|r| (now - r.started_at).num_seconds() < ttl as i64);
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_history(
        &self,
        name: &str,
        intended_at: DateTime<Utc>,
        started_at: DateTime<Utc>,
    ) -> Result<InsertOutcome> {
        self.purge_expired(started_at);

        let intended_at = intended_at
            .with_nanosecond0()
            .unwrap_or(intended_at);

        let mut records = self.records.lock().expect("lock poisoned");
        if records
            .iter()
            .any(|r| r.name == name && r.intended_at == intended_at)
        {
            return Ok(InsertOutcome::Duplicate);
        }

        let id = Uuid::new_v4();
        records.push(HistoryRecord {
            id,
            name: name.to_string(),
            intended_at,
            started_at,
            finished_at: None,
            result: None,
            error: None,
        });
        Ok(InsertOutcome::Inserted(id))
    }

    async fn update_history(&self, id: Uuid, patch: HistoryPatch) -> Result<()> {
        let mut records = self.records.lock().expect("lock poisoned");
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::store(format!("no history record with id {id}")))?;
        record.finished_at = Some(patch.finished_at);
        record.result = patch.result;
        record.error = patch.error;
        Ok(())
    }

    async fn find_recent(&self, name: &str, limit: usize) -> Result<Vec<HistoryRecord>> {
        let records = self.records.lock().expect("lock poisoned");
        let mut matching: Vec<HistoryRecord> = records
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn create_unique_index(&self) -> Result<()> {
        // Enforced manually in `insert_history`; nothing to provision.
        Ok(())
    }

    async fn create_ttl_index(&self, ttl_seconds: u64) -> Result<()> {
        if ttl_seconds < 300 {
            return Err(Error::config("TTL must be at least 300 seconds"));
        }
        *self.ttl_seconds.lock().expect("lock poisoned") = Some(ttl_seconds);
        Ok(())
    }
}

trait TruncateToSecond {
    fn with_nanosecond0(&self) -> Option<DateTime<Utc>>;
}

impl TruncateToSecond for DateTime<Utc> {
    fn with_nanosecond0(&self) -> Option<DateTime<Utc>> {
        use chrono::Timelike;
        self.with_nanosecond(0)
    }
}
