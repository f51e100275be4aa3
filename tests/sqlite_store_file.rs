//! Exercises `SqliteStore` against a real temp-file database rather than
//! `:memory:`, so the unique index and TTL sweep run against actual SQLite
//! file-locking semantics instead of a single in-process connection.

#![cfg(feature = "sqlite-store")]

use chrono::{TimeZone, Utc};
use cronsync::store::sqlite::SqliteStore;
use cronsync::store::{InsertOutcome, RecordStore};

fn dt(s: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, s).unwrap()
}

#[tokio::test]
async fn unique_index_survives_a_fresh_connection_to_the_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cron_history.sqlite3");
    let url = format!("sqlite://{}?mode=rwc", path.display());

    let store = SqliteStore::connect(&url, "cronHistory").await.unwrap();
    store.create_unique_index().await.unwrap();

    let first = store.insert_history("job", dt(0), dt(0)).await.unwrap();
    assert!(matches!(first, InsertOutcome::Inserted(_)));

    // A second store instance opening the same file must still observe the
    // unique constraint — the index lives in the database file, not in any
    // in-process state.
    let reopened = SqliteStore::connect(&url, "cronHistory").await.unwrap();
    let second = reopened.insert_history("job", dt(0), dt(1)).await.unwrap();
    assert_eq!(second, InsertOutcome::Duplicate);

    let recent = reopened.find_recent("job", 10).await.unwrap();
    assert_eq!(recent.len(), 1);
}
