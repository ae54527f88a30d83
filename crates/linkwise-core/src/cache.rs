//! Key/value cache for validated source records.
//!
//! Entries are JSON values addressed by `(namespace, key)`. Keys are derived
//! with [`cache_key`] so that the same entity in another language or for
//! another service never collides.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{Error, Result};

/// Cache collaborator. Reads and writes are atomic per key.
pub trait CacheStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Option<Value>;
    fn put(&self, namespace: &str, key: &str, value: Value) -> Result<()>;
}

/// SHA-256 hex digest of `(entity, language, service)`.
pub fn cache_key(entity: &str, language: &str, service: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entity.trim().to_lowercase().as_bytes());
    hasher.update([0u8]);
    hasher.update(language.as_bytes());
    hasher.update([0u8]);
    hasher.update(service.as_bytes());
    hex::encode(hasher.finalize())
}

/// Build the cache described by the config section.
pub fn from_config(config: &CacheConfig) -> Result<Arc<dyn CacheStore>> {
    if !config.enabled {
        return Ok(Arc::new(NoopCache));
    }
    let ttl = Duration::from_secs(config.ttl_secs);
    match &config.dir {
        Some(dir) => Ok(Arc::new(FileCache::new(dir.clone(), ttl)?)),
        None => Ok(Arc::new(MemoryCache::new(config.max_entries, ttl))),
    }
}

// ---------------------------------------------------------------
// No-op
// ---------------------------------------------------------------

/// Cache that stores nothing.
pub struct NoopCache;

impl CacheStore for NoopCache {
    fn get(&self, _namespace: &str, _key: &str) -> Option<Value> {
        None
    }

    fn put(&self, _namespace: &str, _key: &str, _value: Value) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------
// In-memory LRU
// ---------------------------------------------------------------

struct MemoryEntry {
    value: Value,
    inserted_at: Instant,
}

/// Thread-safe LRU cache with a TTL.
pub struct MemoryCache {
    inner: Mutex<MemoryInner>,
}

struct MemoryInner {
    entries: HashMap<String, MemoryEntry>,
    order: Vec<String>,
    max_size: usize,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                entries: HashMap::new(),
                order: Vec::new(),
                max_size: max_size.max(1),
                ttl,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    fn slot(namespace: &str, key: &str) -> String {
        format!("{}/{}", namespace, key)
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        let slot = Self::slot(namespace, key);
        let mut inner = self.inner.lock();

        let (value, expired) = match inner.entries.get(&slot) {
            Some(entry) => (
                entry.value.clone(),
                entry.inserted_at.elapsed() >= inner.ttl,
            ),
            None => return None,
        };

        inner.order.retain(|k| k != &slot);
        if expired {
            inner.entries.remove(&slot);
            return None;
        }
        inner.order.push(slot);
        Some(value)
    }

    fn put(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        let slot = Self::slot(namespace, key);
        let mut inner = self.inner.lock();

        if inner.entries.contains_key(&slot) {
            inner.order.retain(|k| k != &slot);
        } else {
            while inner.entries.len() >= inner.max_size && !inner.order.is_empty() {
                let oldest = inner.order.remove(0);
                inner.entries.remove(&oldest);
            }
        }

        inner.order.push(slot.clone());
        inner.entries.insert(
            slot,
            MemoryEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
        Ok(())
    }
}

// ---------------------------------------------------------------
// File-backed
// ---------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct FileEntry {
    stored_at: DateTime<Utc>,
    value: Value,
}

/// One JSON file per entry under `<dir>/<namespace>/<key>.json`.
pub struct FileCache {
    dir: PathBuf,
    ttl: Duration,
}

impl FileCache {
    pub fn new(dir: PathBuf, ttl: Duration) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::Cache(format!("{}: {}", dir.display(), e)))?;
        Ok(Self { dir, ttl })
    }

    fn path(&self, namespace: &str, key: &str) -> PathBuf {
        self.dir.join(namespace).join(format!("{}.json", key))
    }

    fn is_expired(&self, stored_at: DateTime<Utc>) -> bool {
        let age = Utc::now().signed_duration_since(stored_at);
        age.to_std().map(|age| age >= self.ttl).unwrap_or(false)
    }
}

impl CacheStore for FileCache {
    fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        let path = self.path(namespace, key);
        let raw = std::fs::read_to_string(&path).ok()?;
        let entry: FileEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", path.display(), e);
                let _ = std::fs::remove_file(&path);
                return None;
            }
        };
        if self.is_expired(entry.stored_at) {
            debug!("Cache entry expired: {}", path.display());
            let _ = std::fs::remove_file(&path);
            return None;
        }
        Some(entry.value)
    }

    fn put(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        let path = self.path(namespace, key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Cache(format!("{}: {}", parent.display(), e)))?;
        }
        let entry = FileEntry {
            stored_at: Utc::now(),
            value,
        };
        std::fs::write(&path, serde_json::to_vec(&entry)?)
            .map_err(|e| Error::Cache(format!("{}: {}", path.display(), e)))
    }
}
