//! # CacheKit Store
//!
//! Named cache buckets for the CacheKit offline cache engine.
//!
//! ## Features
//!
//! - **Buckets**: named, independently lifecycled key→entry partitions
//! - **Lazy creation**: a bucket exists from its first `open`
//! - **Version rollover**: delete every bucket outside the current set
//! - **Expiration sweep**: best-effort purge of individually expired entries
//!
//! ## Architecture
//!
//! ```text
//! BucketStore
//!     ├── "precache-v1" (BucketHandle)
//!     │       └── url → CacheEntry
//!     └── "runtime" (BucketHandle)
//!             └── url → CacheEntry
//! ```
//!
//! Keys are full request URLs; entries are complete stored responses. An
//! entry's expiration rides along inside its headers (see [`expiry`]).
//! Writes are full replacements, last-writer-wins.

use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use hashbrown::HashMap;
use http::{HeaderMap, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub mod expiry;

pub use expiry::EXPIRES_HEADER;

// ==================== Cache Entry ====================

/// A stored response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Response status.
    pub status: StatusCode,

    /// Response status text.
    pub status_text: String,

    /// Response headers, including the expiration stamp when present.
    pub headers: HeaderMap,

    /// Response body.
    pub body: Bytes,
}

impl CacheEntry {
    /// Decode the expiration stamp, if the entry carries a readable one.
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.headers
            .get(EXPIRES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(expiry::decode)
    }

    /// Whether this entry may no longer be served at `now`.
    ///
    /// Entries without a readable expiration stamp never expire. That is
    /// the intended escape hatch for responses cached by other means, not
    /// a parsing failure.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        match self.expires_at() {
            Some(expires_at) => expiry::is_expired(expires_at, now),
            None => false,
        }
    }
}

// ==================== Bucket ====================

/// A named set of url → entry pairs.
#[derive(Debug, Default)]
struct Bucket {
    entries: HashMap<String, CacheEntry>,
}

// ==================== Bucket Handle ====================

/// Shared handle to a named bucket.
///
/// Clones refer to the same storage. Per-key put/delete are atomic under
/// the bucket lock; concurrent writers to one key race last-writer-wins.
#[derive(Debug, Clone)]
pub struct BucketHandle {
    name: String,
    inner: Arc<RwLock<Bucket>>,
}

impl BucketHandle {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: Arc::new(RwLock::new(Bucket::default())),
        }
    }

    /// Bucket name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an entry by key.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.inner.read().await.entries.get(key).cloned()
    }

    /// Store an entry under `key`, replacing any prior entry.
    pub async fn put(&self, key: &str, entry: CacheEntry) {
        self.inner.write().await.entries.insert(key.to_string(), entry);
    }

    /// Delete an entry. Returns whether one existed.
    pub async fn delete(&self, key: &str) -> bool {
        self.inner.write().await.entries.remove(key).is_some()
    }

    /// All keys currently in the bucket, in no particular order.
    pub async fn keys(&self) -> Vec<String> {
        self.inner.read().await.entries.keys().cloned().collect()
    }

    /// Number of entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether the bucket holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// Delete every entry whose expiration stamp is in the past.
    ///
    /// Best-effort per key: entries with no readable stamp are skipped, and
    /// a key that disappears between enumeration and read (a concurrent
    /// delete or sweep) is treated as not found. Returns the number purged.
    pub async fn sweep_expired(&self, now: SystemTime) -> usize {
        let keys = self.keys().await;
        let mut purged = 0;
        for key in keys {
            let Some(entry) = self.get(&key).await else {
                continue;
            };
            let Some(expires_at) = entry.expires_at() else {
                continue;
            };
            if expiry::is_expired(expires_at, now) && self.delete(&key).await {
                purged += 1;
                debug!(bucket = %self.name, key = %key, "expired entry purged");
            }
        }
        purged
    }
}

// ==================== Bucket Store ====================

/// Cache storage: named buckets, created lazily on first open.
#[derive(Debug, Clone, Default)]
pub struct BucketStore {
    buckets: Arc<RwLock<HashMap<String, BucketHandle>>>,
}

impl BucketStore {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a bucket, creating it on first use. Idempotent: every open of
    /// the same name yields handles to the same storage.
    pub async fn open(&self, name: &str) -> BucketHandle {
        self.buckets
            .write()
            .await
            .entry(name.to_string())
            .or_insert_with(|| BucketHandle::new(name))
            .clone()
    }

    /// Check if a bucket exists.
    pub async fn has(&self, name: &str) -> bool {
        self.buckets.read().await.contains_key(name)
    }

    /// Names of all buckets.
    pub async fn bucket_names(&self) -> Vec<String> {
        self.buckets.read().await.keys().cloned().collect()
    }

    /// Delete a whole bucket. Returns whether it existed.
    pub async fn delete_bucket(&self, name: &str) -> bool {
        let deleted = self.buckets.write().await.remove(name).is_some();
        if deleted {
            debug!(bucket = %name, "bucket deleted");
        }
        deleted
    }

    /// Delete every bucket whose name is not in `current`.
    ///
    /// Version rollover: buckets from previous versions are garbage once a
    /// new version activates. Returns the number deleted.
    pub async fn delete_stale_buckets(&self, current: &[&str]) -> usize {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|name, _| {
            let keep = current.contains(&name.as_str());
            if !keep {
                debug!(bucket = %name, "stale bucket deleted");
            }
            keep
        });
        before - buckets.len()
    }

    /// Delete every bucket. Returns the number deleted.
    pub async fn clear_all(&self) -> usize {
        let mut buckets = self.buckets.write().await;
        let purged = buckets.len();
        buckets.clear();
        if purged > 0 {
            info!(count = purged, "all caches purged");
        }
        purged
    }
}
