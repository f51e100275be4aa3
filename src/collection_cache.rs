//! Process-wide store cache.
//!
//! A collection's unique index and TTL index must be provisioned exactly
//! once per process, no matter how many `Registry` instances share the same
//! backing collection name. This keeps a `once_cell`-backed name-keyed map
//! of already-provisioned store handles.

use crate::error::Result;
use crate::store::RecordStore;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

static CACHE: Lazy<Mutex<HashMap<String, Arc<dyn RecordStore>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Fetch the cached store for `collection_name`, or build, index, and cache
/// one via `init` if this is the first request for that name in this
/// process. `ttl_seconds`, when `Some`, provisions the TTL mechanism
/// alongside the unique index.
pub async fn get_or_init<F, Fut>(
    collection_name: &str,
    ttl_seconds: Option<u64>,
    init: F,
) -> Result<Arc<dyn RecordStore>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Arc<dyn RecordStore>>>,
{
    let mut cache = CACHE.lock().await;
    if let Some(store) = cache.get(collection_name) {
        return Ok(store.clone());
    }

    debug!(collection_name, "provisioning store for collection");
    let store = init().await?;
    store.create_unique_index().await?;
    if let Some(ttl) = ttl_seconds {
        store.create_ttl_index(ttl).await?;
    }

    cache.insert(collection_name.to_string(), store.clone());
    Ok(store)
}

/// Remove `collection_name` from the cache, forcing the next `get_or_init`
/// call to reprovision it. Exposed for test isolation.
#[cfg(test)]
pub async fn evict(collection_name: &str) {
    CACHE.lock().await.remove(collection_name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn second_call_reuses_the_first_stores_instance() {
        evict("coll-a").await;
        let init_calls = Arc::new(AtomicU32::new(0));

        let build = |count: Arc<AtomicU32>| async move {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(MemoryStore::new()) as Arc<dyn RecordStore>)
        };

        let first = get_or_init("coll-a", None, || build(init_calls.clone()))
            .await
            .unwrap();
        let second = get_or_init("coll-a", None, || build(init_calls.clone()))
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(init_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_names_get_distinct_stores() {
        evict("coll-b1").await;
        evict("coll-b2").await;

        let first = get_or_init("coll-b1", None, || async {
            Ok(Arc::new(MemoryStore::new()) as Arc<dyn RecordStore>)
        })
        .await
        .unwrap();
        let second = get_or_init("coll-b2", None, || async {
            Ok(Arc::new(MemoryStore::new()) as Arc<dyn RecordStore>)
        })
        .await
        .unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn ttl_is_provisioned_alongside_the_unique_index() {
        evict("coll-c").await;
        let store = get_or_init("coll-c", Some(300), || async {
            Ok(Arc::new(MemoryStore::new()) as Arc<dyn RecordStore>)
        })
        .await
        .unwrap();
        // A TTL below the minimum would have made `get_or_init` return Err;
        // reaching here confirms `create_ttl_index(300)` succeeded.
        let _ = store;
    }
}
