//! File-backed session store
//!
//! Each key lives in its own JSON file inside one directory. The file's
//! modification time is the expiry clock: a write restarts it, a read
//! never does. Expired files are removed when they are read or swept.
//!
//! Writes go through a temporary file in the same directory that is then
//! renamed over the target, so a reader never sees a half-written record.
//! Writes and expiry removals of one file are serialized by a striped lock,
//! and removal re-checks the mtime under that lock, so a stale check can't
//! delete a record that was just rewritten. Other processes sharing the
//! directory are not covered.

use super::{decode_entry, StoreLayer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;

/// Prefix for files named directly after the key
const FILE_PREFIX: &str = "sess_";

/// Prefix for files named after a digest of the key
const HASHED_FILE_PREFIX: &str = "hsess_";

/// Prefix for in-flight writes; never matches the prefixes above
const TEMP_PREFIX: &str = ".tmp_sess_";

/// Longest key that is used verbatim in a file name
const MAX_PLAIN_KEY_LEN: usize = 128;

/// Lock stripes shared by all files of one store
const FILE_LOCK_STRIPES: usize = 64;

/// Store keeping one file per key
#[derive(Clone)]
pub struct FileStore {
    dir: PathBuf,
    ttl: Duration,
    locks: Arc<Vec<Mutex<()>>>,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("dir", &self.dir)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            locks: Arc::new((0..FILE_LOCK_STRIPES).map(|_| Mutex::new(())).collect()),
        }
    }

    /// Directory holding the session files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`
    ///
    /// Keys made of ASCII letters, digits, `-` and `_` map to `sess_<key>`.
    /// Anything else (path separators, dots, very long values) maps to
    /// `hsess_<md5 of key>`, so a client-chosen id always stays inside the
    /// store directory.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name(key))
    }

    fn is_expired(&self, modified: SystemTime) -> bool {
        // An mtime in the future (clock skew) counts as fresh
        SystemTime::now()
            .duration_since(modified)
            .map(|age| age > self.ttl)
            .unwrap_or(false)
    }

    fn lock_for(&self, path: &Path) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        &self.locks[(hasher.finish() as usize) % self.locks.len()]
    }

    /// Delete `path` if it is still expired once no write to it is in
    /// flight. Returns whether the file was removed.
    async fn remove_if_expired(&self, path: &Path) -> Result<bool> {
        let _guard = self.lock_for(path).lock().await;

        let modified = match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to stat session file {}", path.display()))
            }
        };

        if !self.is_expired(modified) {
            return Ok(false);
        }

        remove_if_exists(path).await?;
        Ok(true)
    }
}

fn file_name(key: &str) -> String {
    let plain = !key.is_empty()
        && key.len() <= MAX_PLAIN_KEY_LEN
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

    if plain {
        format!("{}{}", FILE_PREFIX, key)
    } else {
        format!("{}{:x}", HASHED_FILE_PREFIX, md5::compute(key))
    }
}

fn is_store_file(name: &str) -> bool {
    name.starts_with(FILE_PREFIX) || name.starts_with(HASHED_FILE_PREFIX)
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to remove session file {}", path.display()))
        }
    }
}

fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create session directory {}", dir.display()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    tmp.write_all(bytes)
        .context("Failed to write session record")?;

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace session file {}", path.display()))?;

    Ok(())
}

#[async_trait]
impl StoreLayer for FileStore {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to stat session file {}", path.display()))
            }
        };

        let modified = metadata
            .modified()
            .with_context(|| format!("Failed to read mtime of {}", path.display()))?;

        if self.is_expired(modified) {
            if self.remove_if_expired(&path).await? {
                tracing::debug!(path = %path.display(), "Removed expired session file");
                return Ok(None);
            }
            // Rewritten (or removed) since the first check; read what is there now
        }

        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            // Lost a race with a destroy or a sweep
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read session file {}", path.display()))
            }
        };

        Ok(decode_entry(key, &raw))
    }

    async fn put<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).context("Failed to serialize session record")?;
        let dir = self.dir.clone();
        let path = self.path_for(key);

        let _guard = self.lock_for(&path).lock().await;
        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, &bytes))
            .await
            .context("Session write task failed")??;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        remove_if_exists(&self.path_for(key)).await
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to list session directory {}", self.dir.display())
                })
            }
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .context("Failed to iterate session directory")?
        {
            let name = entry.file_name();
            if !name.to_str().is_some_and(is_store_file) {
                continue;
            }

            let path = entry.path();
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable session file");
                    continue;
                }
            };

            if self.is_expired(modified) {
                match self.remove_if_expired(&path).await {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(e) => tracing::warn!(error = %e, "Failed to purge session file"),
                }
            }
        }

        Ok(removed)
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
