//! Consolidated manifest structure and blob-store codec.
//!
//! A manifest is the blob-store payload listing every record blob ever
//! folded into a dataset, oldest first. Manifests are immutable: each
//! consolidation run writes a *new* manifest blob carrying the previous
//! contents by value (copy-append), so reads stay single-hop rather than
//! chaining blob-to-blob references. The superseded manifest blob is
//! orphaned but stays readable until separately garbage-collected.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use weft_core::{BlobId, BlobStore, PutOptions};

use crate::error::{Result, StoreError};

/// Constant discriminator stored in every manifest payload.
pub const MANIFEST_TYPE: &str = "weft.manifest/v1";

/// The consolidated manifest payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Type tag, always [`MANIFEST_TYPE`]. Distinguishes manifests from
    /// pre-consolidation legacy payloads at decode time.
    #[serde(rename = "type")]
    pub manifest_type: String,

    /// Every record blob folded in so far, oldest first. Duplicates are
    /// not filtered: blob identity is store-assigned, so a re-submission
    /// is a distinct datum.
    pub blob_ids: Vec<BlobId>,

    /// When this manifest was written.
    pub consolidated_at: DateTime<Utc>,

    /// Length of `blob_ids`, stored redundantly for fast validation.
    pub count: u64,
}

impl Manifest {
    /// Builds a manifest over the given blob IDs, stamped now.
    #[must_use]
    pub fn new(blob_ids: Vec<BlobId>) -> Self {
        let count = blob_ids.len() as u64;
        Self {
            manifest_type: MANIFEST_TYPE.to_string(),
            blob_ids,
            consolidated_at: Utc::now(),
            count,
        }
    }

    /// Serializes the manifest to its blob payload.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| StoreError::Decode {
            message: format!("failed to serialize manifest: {e}"),
        })?;
        Ok(Bytes::from(json))
    }

    /// Parses and validates a manifest payload.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Decode` if the bytes don't parse, carry the
    /// wrong type tag, or have a count that disagrees with the list.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let manifest: Self = serde_json::from_slice(bytes).map_err(|e| StoreError::Decode {
            message: format!("failed to parse manifest: {e}"),
        })?;

        if manifest.manifest_type != MANIFEST_TYPE {
            return Err(StoreError::Decode {
                message: format!(
                    "unexpected manifest type '{}' (expected '{MANIFEST_TYPE}')",
                    manifest.manifest_type
                ),
            });
        }
        if manifest.count != manifest.blob_ids.len() as u64 {
            return Err(StoreError::Decode {
                message: format!(
                    "manifest count {} disagrees with {} blob IDs",
                    manifest.count,
                    manifest.blob_ids.len()
                ),
            });
        }

        Ok(manifest)
    }
}

/// Reads and writes manifests through the blob store.
pub struct ManifestStore {
    blobs: Arc<dyn BlobStore>,
}

impl ManifestStore {
    /// Creates a new manifest store over the given blob backend.
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Reads and validates the manifest at `blob_id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the blob doesn't resolve,
    /// `StoreError::Decode` if the payload isn't a valid manifest, and
    /// `StoreError::Blob` for other storage failures.
    pub async fn read(&self, blob_id: &BlobId) -> Result<Manifest> {
        let bytes = self.blobs.get(blob_id).await.map_err(|e| {
            if e.is_not_found() {
                StoreError::NotFound {
                    message: format!("manifest blob {blob_id}"),
                }
            } else {
                StoreError::Blob {
                    message: format!("failed to read manifest {blob_id}: {e}"),
                }
            }
        })?;

        Manifest::from_bytes(&bytes)
    }

    /// Writes a new immutable manifest blob over the given IDs.
    ///
    /// Always constructs a fresh manifest; nothing is mutated in place.
    /// Returns the new manifest's store-assigned blob ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Blob` if the underlying write fails.
    pub async fn write(&self, blob_ids: Vec<BlobId>) -> Result<BlobId> {
        let manifest = Manifest::new(blob_ids);
        let bytes = manifest.to_bytes()?;

        // Superseded manifests become orphans; written deletable so a
        // future GC pass can reclaim them.
        self.blobs
            .put(bytes, PutOptions::deletable())
            .await
            .map_err(|e| StoreError::Blob {
                message: format!("failed to write manifest: {e}"),
            })
    }
}
