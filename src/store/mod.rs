//! Session store layer
//!
//! Key-value storage with a store-wide time-to-live, used to persist one
//! record per session id. Backends:
//! - File store - default, one JSON file per key, file mtime is the expiry clock
//! - Memory store (moka) - process-local, handy for tests
//! - Redis store - optional, behind the `redis-store` feature
//!
//! Expired entries are never returned. Entries that can't be decoded are
//! reported as absent instead of failing the read.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sessionpage::store::{create_store, StoreLayer};
//! use sessionpage::config::StoreConfig;
//!
//! let store = create_store(&StoreConfig::default(), Duration::from_secs(1800)).await?;
//! store.put("abc", &record).await?;
//! let record: Option<SessionRecord> = store.get("abc").await?;
//! ```

pub mod file;
pub mod memory;
#[cfg(feature = "redis-store")]
pub mod redis;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{StoreConfig, StoreDriver};

/// Store layer trait
///
/// Like the generic methods it carries, this trait is not object safe.
/// Use the `Store` enum for runtime polymorphism.
#[async_trait]
pub trait StoreLayer: Send + Sync {
    /// Get a live value. Missing, expired and undecodable entries are `None`.
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Replace the value under `key` and restart its time-to-live
    async fn put<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<()>;

    /// Remove the value under `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every expired entry, returning how many were removed
    async fn purge_expired(&self) -> Result<usize>;

    /// Time-to-live applied to every entry
    fn ttl(&self) -> Duration;
}

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "redis-store")]
pub use redis::RedisStore;

/// Unified store enum for runtime polymorphism
#[derive(Debug)]
pub enum Store {
    /// One file per session
    File(FileStore),
    /// In-memory store using moka
    Memory(MemoryStore),
    /// Redis store for multi-instance deployment
    #[cfg(feature = "redis-store")]
    Redis(RedisStore),
}

#[async_trait]
impl StoreLayer for Store {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self {
            Store::File(store) => store.get(key).await,
            Store::Memory(store) => store.get(key).await,
            #[cfg(feature = "redis-store")]
            Store::Redis(store) => store.get(key).await,
        }
    }

    async fn put<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<()> {
        match self {
            Store::File(store) => store.put(key, value).await,
            Store::Memory(store) => store.put(key, value).await,
            #[cfg(feature = "redis-store")]
            Store::Redis(store) => store.put(key, value).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Store::File(store) => store.delete(key).await,
            Store::Memory(store) => store.delete(key).await,
            #[cfg(feature = "redis-store")]
            Store::Redis(store) => store.delete(key).await,
        }
    }

    async fn purge_expired(&self) -> Result<usize> {
        match self {
            Store::File(store) => store.purge_expired().await,
            Store::Memory(store) => store.purge_expired().await,
            #[cfg(feature = "redis-store")]
            Store::Redis(store) => store.purge_expired().await,
        }
    }

    fn ttl(&self) -> Duration {
        match self {
            Store::File(store) => store.ttl(),
            Store::Memory(store) => store.ttl(),
            #[cfg(feature = "redis-store")]
            Store::Redis(store) => store.ttl(),
        }
    }
}

/// Decode a stored entry, treating corrupt content as absent
pub(crate) fn decode_entry<T: DeserializeOwned>(key: &str, raw: &[u8]) -> Option<T> {
    match serde_json::from_slice(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding unreadable session entry");
            None
        }
    }
}

/// Create a store instance based on configuration
///
/// - `StoreDriver::File` - one file per session under `config.dir`
/// - `StoreDriver::Memory` - an in-memory moka cache
/// - `StoreDriver::Redis` - Redis (requires the `redis-store` feature)
///
/// # Errors
/// - Redis is configured but the `redis-store` feature is not enabled
/// - Redis is configured without a URL, or the connection fails
pub async fn create_store(config: &StoreConfig, ttl: Duration) -> Result<Arc<Store>> {
    match config.driver {
        StoreDriver::File => Ok(Arc::new(Store::File(FileStore::new(&config.dir, ttl)))),
        StoreDriver::Memory => Ok(Arc::new(Store::Memory(MemoryStore::with_capacity_and_ttl(
            config.memory_capacity,
            ttl,
        )))),
        StoreDriver::Redis => {
            #[cfg(feature = "redis-store")]
            {
                let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "Redis URL is required when using the redis store driver. \
                         Set 'store.redis_url' or SESSIONPAGE_STORE_REDIS_URL."
                    )
                })?;

                let store = RedisStore::connect(redis_url, ttl).await?;
                Ok(Arc::new(Store::Redis(store)))
            }

            #[cfg(not(feature = "redis-store"))]
            {
                anyhow::bail!(
                    "Redis store driver is configured but the 'redis-store' feature is not enabled. \
                     Either enable the feature with `--features redis-store` or use the 'file' driver."
                )
            }
        }
    }
}
