//! Redis session store
//!
//! Lets several server instances share sessions. Expiry is delegated to
//! Redis via `SET ... EX`, so there is nothing to sweep.

use super::{decode_entry, StoreLayer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Namespace for every key written by this store
const KEY_PREFIX: &str = "sessionpage:session:";

/// Redis-backed store
pub struct RedisStore {
    connection: MultiplexedConnection,
    ttl: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to `redis_url`
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self> {
        let client = Client::open(redis_url).context("Failed to create Redis client")?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self { connection, ttl })
    }

    fn redis_key(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }
}

#[async_trait]
impl StoreLayer for RedisStore {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.connection.clone();

        let raw: Option<String> = conn
            .get(Self::redis_key(key))
            .await
            .context("Failed to get session from Redis")?;

        Ok(raw.and_then(|json| decode_entry(key, json.as_bytes())))
    }

    async fn put<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(value).context("Failed to serialize session record")?;

        // Redis TTLs are whole seconds
        let ttl_secs = self.ttl.as_secs().max(1);

        let _: () = conn
            .set_ex(Self::redis_key(key), json, ttl_secs)
            .await
            .context("Failed to store session in Redis")?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();

        let _: () = conn
            .del(Self::redis_key(key))
            .await
            .context("Failed to delete session from Redis")?;

        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
