//! Session service
//!
//! The session lifecycle on top of a [`Store`]:
//! - `load` fails soft: unknown, expired and corrupt sessions read as empty
//! - `save` overwrites the whole record and restarts the expiry clock
//! - `destroy` removes the record and is idempotent
//! - `update` merges submitted fields into the stored record
//!
//! Storage failures are surfaced as [`SessionServiceError::Storage`].

use crate::models::{SessionId, SessionRecord, SessionUpdate};
use crate::store::{Store, StoreLayer};
use anyhow::Context;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Number of lock stripes shared by all session ids
const LOCK_STRIPES: usize = 64;

/// Error types for session service operations
#[derive(Debug, thiserror::Error)]
pub enum SessionServiceError {
    /// The backing store failed (disk full, permission denied, Redis down...)
    #[error("Session storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    /// The OS random source failed while minting an id
    #[error("Failed to generate session id: {0}")]
    Entropy(String),
}

/// Service owning the session lifecycle
pub struct SessionService {
    store: Arc<Store>,
    locks: Vec<Mutex<()>>,
}

impl SessionService {
    /// Create a session service over `store`
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Idle time after which a session is gone
    pub fn timeout(&self) -> Duration {
        self.store.ttl()
    }

    /// Load the record for `id`
    ///
    /// Returns an empty record when the session was never saved, has
    /// expired (its entry is purged as a side effect) or can't be decoded.
    pub async fn load(&self, id: &SessionId) -> Result<SessionRecord, SessionServiceError> {
        let record = self
            .store
            .get::<SessionRecord>(id.as_str())
            .await
            .context("Failed to load session")?;

        Ok(record.unwrap_or_default())
    }

    /// Replace the stored record for `id`
    ///
    /// Callers wanting per-field semantics should use [`update`](Self::update).
    pub async fn save(
        &self,
        id: &SessionId,
        record: &SessionRecord,
    ) -> Result<(), SessionServiceError> {
        self.store
            .put(id.as_str(), record)
            .await
            .context("Failed to save session")?;

        Ok(())
    }

    /// Remove the stored record for `id`. Succeeds if there is none.
    pub async fn destroy(&self, id: &SessionId) -> Result<(), SessionServiceError> {
        self.store
            .delete(id.as_str())
            .await
            .context("Failed to destroy session")?;

        tracing::info!("Session destroyed");
        Ok(())
    }

    /// Merge `update` into the stored record and persist it
    ///
    /// Empty or missing fields keep their previous value. An update with no
    /// fields at all still persists the record, which restarts its expiry.
    /// Concurrent updates to the same id inside this process are applied
    /// one after the other. Expiry removal by a concurrent `load` or sweep
    /// never deletes the freshly saved record; the store re-checks the
    /// mtime under its own per-file lock. Nothing is coordinated across
    /// processes.
    pub async fn update(
        &self,
        id: &SessionId,
        update: &SessionUpdate,
    ) -> Result<SessionRecord, SessionServiceError> {
        let _guard = self.lock_for(id).lock().await;

        let mut record = self.load(id).await?;
        record.merge(update);
        self.save(id, &record).await?;

        Ok(record)
    }

    /// Delete every expired session, returning how many were removed
    pub async fn purge_expired(&self) -> Result<usize, SessionServiceError> {
        let removed = self
            .store
            .purge_expired()
            .await
            .context("Failed to purge expired sessions")?;

        Ok(removed)
    }

    fn lock_for(&self, id: &SessionId) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        &self.locks[(hasher.finish() as usize) % self.locks.len()]
    }
}
