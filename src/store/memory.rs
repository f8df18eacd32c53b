//! In-memory session store using moka
//!
//! Entries are kept as JSON strings so any serializable value can be stored.
//! moka's `time_to_live` restarts on every insert, which gives the same
//! sliding expiry as the file store's mtime check.

use super::{decode_entry, StoreLayer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default maximum number of live sessions
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// In-memory store using moka
#[derive(Clone)]
pub struct MemoryStore {
    cache: Cache<String, Arc<String>>,
    ttl: Duration,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entry_count", &self.cache.entry_count())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl MemoryStore {
    /// Create a store with the default capacity
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, ttl)
    }

    /// Create a store holding at most `max_capacity` sessions
    pub fn with_capacity_and_ttl(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { cache, ttl }
    }

    /// Eviction ceiling, as configured
    pub fn max_capacity(&self) -> Option<u64> {
        self.cache.policy().max_capacity()
    }

    /// Approximate number of live entries
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl StoreLayer for MemoryStore {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        Ok(self
            .cache
            .get(key)
            .await
            .and_then(|raw| decode_entry(key, raw.as_bytes())))
    }

    async fn put<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).context("Failed to serialize session record")?;
        self.cache.insert(key.to_string(), Arc::new(json)).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let before = self.cache.entry_count();
        self.cache.run_pending_tasks().await;
        let after = self.cache.entry_count();
        Ok(before.saturating_sub(after) as usize)
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionRecord;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryStore::with_ttl(Duration::from_secs(60));
        let record: SessionRecord = [("username", "alice")].into_iter().collect();

        store.put("key1", &record).await.unwrap();

        let result: Option<SessionRecord> = store.get("key1").await.unwrap();
        assert_eq!(result, Some(record));
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let store = MemoryStore::with_ttl(Duration::from_secs(60));

        store.delete("nope").await.unwrap();
        store.put("k", &"v".to_string()).await.unwrap();
        store.delete("k").await.unwrap();

        let result: Option<String> = store.get("k").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let store = MemoryStore::with_ttl(Duration::from_millis(20));

        store.put("k", &"v".to_string()).await.unwrap();
        let fresh: Option<String> = store.get("k").await.unwrap();
        assert_eq!(fresh, Some("v".to_string()));

        tokio::time::sleep(Duration::from_millis(80)).await;

        let stale: Option<String> = store.get("k").await.unwrap();
        assert_eq!(stale, None);
    }

    #[tokio::test]
    async fn test_purge_expired_drops_stale_entries() {
        let store = MemoryStore::with_ttl(Duration::from_millis(20));

        store.put("a", &"1".to_string()).await.unwrap();
        store.put("b", &"2".to_string()).await.unwrap();
        store.cache.run_pending_tasks().await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        store.purge_expired().await.unwrap();

        assert_eq!(store.entry_count(), 0);
    }
}
