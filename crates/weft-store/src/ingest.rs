//! Record ingestion.
//!
//! Stores a submitted payload in the blob store and files a pending
//! [`crate::record::Record`] pointing at it. Ingestion surfaces errors
//! directly to the caller; there is no silent recovery on this path.

use std::sync::Arc;

use bytes::Bytes;

use weft_core::observability::ingest_span;
use weft_core::{BlobStore, DatasetId, PutOptions};

use crate::dataset::DatasetRegistry;
use crate::error::{Result, StoreError};
use crate::metrics;
use crate::record::{NewRecord, Record, RecordStore};

/// A validated ingestion request.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Dataset to file the record under.
    pub dataset_id: DatasetId,
    /// Raw payload bytes to store.
    pub payload: Bytes,
    /// Declared payload size in bytes (recorded as-is, not verified).
    pub byte_size: u64,
    /// Free-form content-format tag.
    pub format: String,
    /// Optional submitter metadata.
    pub metadata: Option<serde_json::Value>,
}

/// Stores payloads and files pending records.
pub struct IngestService {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
    registry: Arc<dyn DatasetRegistry>,
}

impl IngestService {
    /// Creates a new ingest service over the given stores.
    #[must_use]
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
        registry: Arc<dyn DatasetRegistry>,
    ) -> Self {
        Self {
            blobs,
            records,
            registry,
        }
    }

    /// Stores a payload and creates its pending record.
    ///
    /// The record becomes visible to the *next* consolidation run's
    /// pending query; ingestion never interferes with a run already in
    /// flight.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` for malformed input,
    /// `StoreError::NotFound` if the dataset is unknown, and blob or
    /// persistence errors if either write fails.
    pub async fn store(&self, request: IngestRequest) -> Result<Record> {
        let span = ingest_span(&request.dataset_id.to_string());
        let _enter = span.enter();

        if request.payload.is_empty() {
            return Err(StoreError::Validation {
                message: "payload must not be empty".into(),
            });
        }
        if request.format.trim().is_empty() {
            return Err(StoreError::Validation {
                message: "format must not be empty".into(),
            });
        }

        // Verify the dataset exists before writing anything.
        self.registry.get(&request.dataset_id).await?;

        let blob_id = self
            .blobs
            .put(request.payload, PutOptions::default())
            .await
            .map_err(|e| StoreError::Blob {
                message: format!("failed to store payload: {e}"),
            })?;

        let record = self
            .records
            .create(NewRecord {
                dataset_id: request.dataset_id,
                blob_id: blob_id.clone(),
                byte_size: request.byte_size,
                format: request.format,
                metadata: request.metadata,
            })
            .await?;

        metrics::record_ingest();
        tracing::info!(
            blob_id = %blob_id,
            byte_size = record.byte_size,
            "stored record, pending consolidation"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{MemoryDatasetRegistry, NewDataset};
    use crate::record::MemoryRecordStore;
    use weft_core::MemoryBlobStore;

    fn service() -> (IngestService, Arc<MemoryDatasetRegistry>) {
        let registry = Arc::new(MemoryDatasetRegistry::new());
        let service = IngestService::new(
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryRecordStore::new()),
            registry.clone(),
        );
        (service, registry)
    }

    async fn dataset(registry: &MemoryDatasetRegistry) -> DatasetId {
        registry
            .create(NewDataset {
                name: "orders".into(),
                description: "test".into(),
                format: "json".into(),
                tags: vec![],
                is_public: true,
                price: 0,
            })
            .await
            .expect("create")
            .id
    }

    fn request(dataset_id: DatasetId) -> IngestRequest {
        IngestRequest {
            dataset_id,
            payload: Bytes::from(r#"{"item":"widget"}"#),
            byte_size: 17,
            format: "json".into(),
            metadata: Some(serde_json::json!({"source": "extension"})),
        }
    }

    #[tokio::test]
    async fn ingest_creates_pending_record() {
        let (service, registry) = service();
        let dataset_id = dataset(&registry).await;

        let record = service.store(request(dataset_id)).await.expect("store");

        assert!(!record.is_processed);
        assert_eq!(record.dataset_id, dataset_id);
        assert_eq!(record.byte_size, 17);
    }

    #[tokio::test]
    async fn unknown_dataset_is_rejected() {
        let (service, _registry) = service();
        let err = service
            .store(request(DatasetId::generate()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn empty_payload_is_rejected_before_any_write() {
        let (service, registry) = service();
        let dataset_id = dataset(&registry).await;
        let mut req = request(dataset_id);
        req.payload = Bytes::new();

        let err = service.store(req).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
    }

    #[tokio::test]
    async fn blank_format_is_rejected() {
        let (service, registry) = service();
        let dataset_id = dataset(&registry).await;
        let mut req = request(dataset_id);
        req.format = "  ".into();

        let err = service.store(req).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
    }
}
