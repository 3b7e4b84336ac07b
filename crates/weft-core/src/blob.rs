//! Blob store abstraction for opaque byte payloads.
//!
//! This module defines the storage contract the consolidation pipeline
//! depends on. The contract is deliberately narrow:
//!
//! - Blobs are **immutable** once written
//! - Identity is **store-assigned**: `put` returns a [`BlobId`], callers
//!   never choose one. Re-ingesting identical bytes yields a distinct ID.
//! - Writes may carry a deletable flag and a retention duration; an
//!   expired blob behaves exactly like an unknown one (`NotFound`)
//!
//! The ID is an opaque `String` so backends with different identity
//! schemes (content digests, epoch-scoped handles, random tokens) all fit
//! behind the same trait without leaking their scheme into the pipeline.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use ulid::Ulid;

use crate::error::{Error, Result};

/// An opaque, store-assigned blob identifier.
///
/// Unlike [`crate::DatasetId`] and [`crate::RecordId`], this is not a
/// ULID newtype: the blob store owns the identity scheme and weft only
/// ever round-trips the string it was handed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    /// Wraps a store-assigned identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BlobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for BlobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Options applied at blob write time.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Whether the store may later delete this blob on request.
    pub deletable: bool,
    /// How long the store must retain the blob; `None` means the
    /// backend's default retention.
    pub retention: Option<Duration>,
}

impl PutOptions {
    /// Options for blobs that may be garbage-collected later.
    #[must_use]
    pub fn deletable() -> Self {
        Self {
            deletable: true,
            retention: None,
        }
    }
}

/// Metadata about a stored blob.
#[derive(Debug, Clone)]
pub struct BlobMeta {
    /// The blob's store-assigned identifier.
    pub id: BlobId,
    /// Blob size in bytes.
    pub size: u64,
    /// Whether the blob was written as deletable.
    pub deletable: bool,
    /// When the blob was written.
    pub created_at: DateTime<Utc>,
    /// When the blob's retention lapses, if a retention was set.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Storage backend trait for opaque blob payloads.
///
/// All backends (the external content store, memory) implement this.
/// Every call is a blocking I/O boundary; callers should treat timeouts
/// as retryable storage errors.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Writes a new immutable blob and returns its store-assigned ID.
    ///
    /// Returns `Error::Storage` if the underlying write fails.
    async fn put(&self, data: Bytes, options: PutOptions) -> Result<BlobId>;

    /// Reads an entire blob.
    ///
    /// Returns `Error::NotFound` if the ID is unknown, or if the blob
    /// has expired or been deleted.
    async fn get(&self, id: &BlobId) -> Result<Bytes>;

    /// Gets blob metadata without reading content.
    ///
    /// Returns `None` if the blob doesn't exist (including expiry).
    async fn head(&self, id: &BlobId) -> Result<Option<BlobMeta>>;

    /// Deletes a blob.
    ///
    /// Succeeds even if the blob doesn't exist (idempotent). Returns
    /// `Error::InvalidInput` if the blob exists but was not written as
    /// deletable.
    async fn delete(&self, id: &BlobId) -> Result<()>;
}

/// In-memory blob store for testing and debug deployments.
///
/// Thread-safe via `RwLock`. Assigns ULID identifiers, so two writes of
/// the same bytes produce distinct blobs, matching the external store's
/// observed behavior. Retention is enforced lazily at read time.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, StoredBlob>>>,
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    deletable: bool,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredBlob {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

impl MemoryBlobStore {
    /// Creates a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live (unexpired) blobs, for assertions.
    ///
    /// # Panics
    ///
    /// Panics if the interior lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs
            .read()
            .expect("blob lock poisoned")
            .values()
            .filter(|b| !b.is_expired())
            .count()
    }

    /// Returns true when the store holds no live blobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn locked(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, StoredBlob>>> {
        self.blobs.read().map_err(|_| Error::Internal {
            message: "blob lock poisoned".into(),
        })
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, data: Bytes, options: PutOptions) -> Result<BlobId> {
        let id = Ulid::new().to_string();
        let now = Utc::now();
        let expires_at = options
            .retention
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| now + d);

        let mut blobs = self.blobs.write().map_err(|_| Error::Internal {
            message: "blob lock poisoned".into(),
        })?;
        blobs.insert(
            id.clone(),
            StoredBlob {
                data,
                deletable: options.deletable,
                created_at: now,
                expires_at,
            },
        );
        drop(blobs);

        Ok(BlobId::new(id))
    }

    async fn get(&self, id: &BlobId) -> Result<Bytes> {
        let blobs = self.locked()?;
        blobs
            .get(id.as_str())
            .filter(|b| !b.is_expired())
            .map(|b| b.data.clone())
            .ok_or_else(|| Error::not_found("blob", id))
    }

    async fn head(&self, id: &BlobId) -> Result<Option<BlobMeta>> {
        let blobs = self.locked()?;
        Ok(blobs
            .get(id.as_str())
            .filter(|b| !b.is_expired())
            .map(|b| BlobMeta {
                id: id.clone(),
                size: b.data.len() as u64,
                deletable: b.deletable,
                created_at: b.created_at,
                expires_at: b.expires_at,
            }))
    }

    async fn delete(&self, id: &BlobId) -> Result<()> {
        let mut blobs = self.blobs.write().map_err(|_| Error::Internal {
            message: "blob lock poisoned".into(),
        })?;
        if let Some(blob) = blobs.get(id.as_str()) {
            if !blob.deletable && !blob.is_expired() {
                return Err(Error::InvalidInput(format!(
                    "blob {id} was not written as deletable"
                )));
            }
            blobs.remove(id.as_str());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let store = MemoryBlobStore::new();
        let data = Bytes::from("hello world");

        let id = store
            .put(data.clone(), PutOptions::default())
            .await
            .expect("put");
        let retrieved = store.get(&id).await.expect("get");

        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn identical_payloads_get_distinct_ids() {
        let store = MemoryBlobStore::new();
        let data = Bytes::from("same bytes");

        let a = store.put(data.clone(), PutOptions::default()).await.expect("put a");
        let b = store.put(data, PutOptions::default()).await.expect("put b");

        // Identity is store-assigned, not content-derived.
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn unknown_blob_is_not_found() {
        let store = MemoryBlobStore::new();
        let err = store.get(&BlobId::new("missing")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn expired_blob_behaves_like_missing() {
        let store = MemoryBlobStore::new();
        let id = store
            .put(
                Bytes::from("ephemeral"),
                PutOptions {
                    deletable: true,
                    retention: Some(Duration::ZERO),
                },
            )
            .await
            .expect("put");

        let err = store.get(&id).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.head(&id).await.expect("head").is_none());
    }

    #[tokio::test]
    async fn head_reports_size_and_flags() {
        let store = MemoryBlobStore::new();
        let id = store
            .put(Bytes::from("1234"), PutOptions::deletable())
            .await
            .expect("put");

        let meta = store.head(&id).await.expect("head").expect("exists");
        assert_eq!(meta.size, 4);
        assert!(meta.deletable);
        assert!(meta.expires_at.is_none());
    }

    #[tokio::test]
    async fn delete_respects_deletable_flag() {
        let store = MemoryBlobStore::new();
        let permanent = store
            .put(Bytes::from("keep"), PutOptions::default())
            .await
            .expect("put");
        let disposable = store
            .put(Bytes::from("toss"), PutOptions::deletable())
            .await
            .expect("put");

        assert!(store.delete(&permanent).await.is_err());
        store.delete(&disposable).await.expect("delete deletable");
        // Deleting an already-gone blob is idempotent.
        store.delete(&disposable).await.expect("delete again");

        assert!(store.get(&permanent).await.is_ok());
        assert!(store.get(&disposable).await.unwrap_err().is_not_found());
    }
}
