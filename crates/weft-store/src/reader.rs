//! Read paths: single records and consolidated datasets.
//!
//! Single-record retrieval surfaces every error to the caller.
//! Consolidated retrieval follows the best-effort policy: an individual
//! record blob that fails to fetch is dropped and counted, never fatal
//! for the whole download.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use weft_core::{BlobId, BlobStore, DatasetId};

use crate::dataset::DatasetRegistry;
use crate::error::{Result, StoreError};
use crate::manifest::ManifestStore;
use crate::record::RecordStore;

/// A single record's payload with its bookkeeping fields.
#[derive(Debug, Clone)]
pub struct RecordPayload {
    /// The blob holding the payload.
    pub blob_id: BlobId,
    /// Raw payload bytes.
    pub data: Bytes,
    /// Owning dataset.
    pub dataset_id: DatasetId,
    /// Content-format tag from ingestion.
    pub format: String,
    /// Submitter metadata from ingestion.
    pub metadata: Option<serde_json::Value>,
}

/// One successfully fetched entry of a consolidated download.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedEntry {
    /// The record blob this entry came from.
    pub blob_id: BlobId,
    /// Payload bytes, lossily decoded to UTF-8 for the JSON envelope.
    pub data: String,
}

/// The consolidated download envelope with partial-success counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedDataset {
    /// The dataset downloaded.
    pub dataset_id: DatasetId,
    /// When the manifest was written.
    pub consolidated_at: DateTime<Utc>,
    /// Entries referenced by the manifest (one per submitting user).
    pub total_users: usize,
    /// Entries actually fetched.
    pub valid_users: usize,
    /// Entries whose blob fetch failed; dropped from `entries`.
    pub failed_fetches: usize,
    /// The fetched payloads, in manifest order.
    pub entries: Vec<ConsolidatedEntry>,
}

/// Resolves records and consolidated manifests into payloads.
pub struct DatasetReader {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
    registry: Arc<dyn DatasetRegistry>,
    manifests: ManifestStore,
}

impl DatasetReader {
    /// Creates a new reader over the given stores.
    #[must_use]
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
        registry: Arc<dyn DatasetRegistry>,
    ) -> Self {
        let manifests = ManifestStore::new(blobs.clone());
        Self {
            blobs,
            records,
            registry,
            manifests,
        }
    }

    /// Retrieves one record's payload by its blob ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no record references the blob
    /// or the blob itself is gone, and `StoreError::Blob` for other
    /// storage failures.
    pub async fn retrieve_record(&self, blob_id: &BlobId) -> Result<RecordPayload> {
        let record = self
            .records
            .find_by_blob(blob_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                message: format!("record with blob id {blob_id}"),
            })?;

        let data = self.blobs.get(blob_id).await.map_err(|e| {
            if e.is_not_found() {
                StoreError::NotFound {
                    message: format!("blob {blob_id}"),
                }
            } else {
                StoreError::Blob {
                    message: format!("failed to read blob {blob_id}: {e}"),
                }
            }
        })?;

        Ok(RecordPayload {
            blob_id: blob_id.clone(),
            data,
            dataset_id: record.dataset_id,
            format: record.format,
            metadata: record.metadata,
        })
    }

    /// Downloads a dataset's consolidated contents.
    ///
    /// Resolves the dataset's manifest pointer, reads the manifest, and
    /// fetches every referenced blob. Individual fetch failures are
    /// logged, counted in the envelope, and dropped from the entries.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the dataset is unknown or has
    /// never been consolidated, and manifest read errors as-is (this is
    /// a retrieval path, not the batch; nothing is recovered to empty).
    pub async fn read_consolidated(&self, dataset_id: &DatasetId) -> Result<ConsolidatedDataset> {
        let dataset = self.registry.get(dataset_id).await?;
        let manifest_id = dataset
            .manifest_blob_id
            .as_ref()
            .ok_or_else(|| StoreError::NotFound {
                message: format!("dataset {dataset_id} has no consolidated data yet"),
            })?;

        let manifest = self.manifests.read(manifest_id).await?;
        let total_users = manifest.blob_ids.len();

        let mut entries = Vec::with_capacity(total_users);
        let mut failed_fetches = 0usize;
        for blob_id in &manifest.blob_ids {
            match self.blobs.get(blob_id).await {
                Ok(data) => entries.push(ConsolidatedEntry {
                    blob_id: blob_id.clone(),
                    data: String::from_utf8_lossy(&data).into_owned(),
                }),
                Err(e) => {
                    failed_fetches += 1;
                    tracing::warn!(
                        blob_id = %blob_id,
                        error = %e,
                        "dropping unfetchable entry from consolidated download"
                    );
                }
            }
        }

        Ok(ConsolidatedDataset {
            dataset_id: *dataset_id,
            consolidated_at: manifest.consolidated_at,
            total_users,
            valid_users: entries.len(),
            failed_fetches,
            entries,
        })
    }
}
