//! Durable cache of the last successful GET payload per logical key.
//!
//! Records are JSON-encoded [`CachedEntry`] values under `cache:{key}`. A
//! record that fails to decode is logged and treated as a miss; it never
//! fails the caller.

use std::sync::Arc;

use sealgate_domain::constants::CACHE_PREFIX;
use sealgate_domain::{CachedEntry, LogicalKey, Result};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::ports::DurableStore;

pub struct ResponseCache {
    store: Arc<dyn DurableStore>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache").finish_non_exhaustive()
    }
}

impl ResponseCache {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store, write_lock: Mutex::new(()) }
    }

    fn slot(key: &LogicalKey) -> String {
        format!("{CACHE_PREFIX}{key}")
    }

    /// Store `payload` for `key`, replacing any previous entry.
    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    pub async fn put(
        &self,
        key: &LogicalKey,
        status_code: u16,
        payload: &[u8],
    ) -> Result<CachedEntry> {
        let entry = CachedEntry::new(key.clone(), status_code, payload.to_vec());
        let record = serde_json::to_vec(&entry)?;

        let _guard = self.write_lock.lock().await;
        self.store.put(&Self::slot(key), &record).await?;
        debug!("cache entry stored");
        Ok(entry)
    }

    /// Entry for `key`, or `None` when absent or unreadable.
    ///
    /// # Errors
    /// Only store failures are returned; corrupt records are a miss.
    pub async fn get(&self, key: &LogicalKey) -> Result<Option<CachedEntry>> {
        let Some(raw) = self.store.get(&Self::slot(key)).await? else {
            return Ok(None);
        };

        match serde_json::from_slice::<CachedEntry>(&raw) {
            Ok(entry) if entry.key == *key => Ok(Some(entry)),
            Ok(entry) => {
                warn!(key = %key, stored_key = %entry.key, "cache record key mismatch; ignoring");
                Ok(None)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "malformed cached data; treating as miss");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    fn cache() -> (ResponseCache, MemoryStore) {
        let store = MemoryStore::new();
        (ResponseCache::new(Arc::new(store.clone())), store)
    }

    /// Validates `ResponseCache::put` behavior for the overwrite scenario.
    ///
    /// Assertions:
    /// - The latest write wins.
    /// - Exactly one record exists for the key.
    #[tokio::test]
    async fn test_put_overwrites() {
        let (cache, store) = cache();
        let key = LogicalKey::from("GET:/posts/1");

        cache.put(&key, 200, br#"{"id":1,"title":"x"}"#).await.unwrap();
        cache.put(&key, 200, br#"{"id":1,"title":"z"}"#).await.unwrap();

        let entry = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(entry.payload, br#"{"id":1,"title":"z"}"#);
        assert_eq!(entry.status_code, 200);
        assert_eq!(store.keys_with_prefix(CACHE_PREFIX), vec!["cache:GET:/posts/1".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let (cache, _) = cache();
        assert!(cache.get(&LogicalKey::from("GET:/nothing")).await.unwrap().is_none());
    }

    /// Validates `ResponseCache::get` behavior for the corrupt record
    /// scenario.
    ///
    /// Assertions:
    /// - A non-JSON record reads as a miss, not an error.
    #[tokio::test]
    async fn test_corrupt_record_is_miss() {
        let (cache, store) = cache();
        store.insert_raw("cache:GET:/posts/1", b"\x00garbage{");

        let result = cache.get(&LogicalKey::from("GET:/posts/1")).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_store_failure_is_error() {
        let (cache, store) = cache();
        store.set_failing(true);
        assert!(cache.get(&LogicalKey::from("GET:/posts/1")).await.is_err());
    }
}
