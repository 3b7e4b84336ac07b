//! Pending-record store.
//!
//! Every ingested item becomes one [`Record`] row pointing at the blob
//! where its payload lives. Records start unprocessed; the consolidator
//! is the only writer of the `is_processed` flag and the only deleter.
//!
//! INVARIANT: a record with `is_processed == false` has never appeared in
//! any manifest. A record is deleted only after the manifest write and
//! dataset registry update that subsume it have both succeeded.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use weft_core::{BlobId, DatasetId, RecordId};

use crate::error::{Result, StoreError};

/// A single submitted item awaiting consolidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Unique identifier, assigned at creation.
    pub id: RecordId,
    /// Owning dataset.
    pub dataset_id: DatasetId,
    /// Where this record's payload lives in the blob store.
    pub blob_id: BlobId,
    /// Declared payload size in bytes (not verified against the store).
    pub byte_size: u64,
    /// Free-form content-format tag (e.g. `json`, `csv`).
    pub format: String,
    /// Open key/value metadata from the submitter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Set true exactly once, by the consolidator, when folded into a
    /// manifest.
    pub is_processed: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a record.
#[derive(Debug, Clone)]
pub struct NewRecord {
    /// Owning dataset.
    pub dataset_id: DatasetId,
    /// Blob holding the payload.
    pub blob_id: BlobId,
    /// Declared payload size in bytes.
    pub byte_size: u64,
    /// Free-form content-format tag.
    pub format: String,
    /// Optional submitter metadata.
    pub metadata: Option<serde_json::Value>,
}

/// Persistence contract for pending records.
///
/// Backed by a document store in production; the in-memory implementation
/// below serves tests and debug deployments. Bulk operations are
/// expected to be idempotent under retry.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Creates a new unprocessed record.
    async fn create(&self, record: NewRecord) -> Result<Record>;

    /// Finds the record referencing the given blob, if any.
    async fn find_by_blob(&self, blob_id: &BlobId) -> Result<Option<Record>>;

    /// Returns all unprocessed records for a dataset, in insertion order.
    ///
    /// Callers must not rely on a stable set across retries: new pending
    /// records may arrive concurrently with a consolidation run.
    async fn find_pending(&self, dataset_id: &DatasetId) -> Result<Vec<Record>>;

    /// Returns the distinct dataset IDs having at least one unprocessed
    /// record.
    async fn datasets_with_pending(&self) -> Result<Vec<DatasetId>>;

    /// Marks records as processed. Idempotent: marking an already
    /// processed or missing record is a no-op, never an error.
    async fn mark_processed(&self, record_ids: &[RecordId]) -> Result<()>;

    /// Hard-deletes records that are already marked processed.
    ///
    /// Records still unprocessed are left in place; deletion is advisory
    /// cleanup, not part of the correctness contract.
    async fn delete_processed(&self, record_ids: &[RecordId]) -> Result<()>;
}

/// In-memory record store for testing and debug deployments.
///
/// `BTreeMap` keyed by ULID record ID gives insertion-ordered iteration:
/// IDs come from a process-wide monotonic generator, so even records
/// created within the same millisecond sort in creation order.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<BTreeMap<RecordId, Record>>>,
}

impl MemoryRecordStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn write_lock(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<RecordId, Record>>> {
        self.records.write().map_err(|_| StoreError::Persistence {
            message: "record lock poisoned".into(),
        })
    }

    fn read_lock(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<RecordId, Record>>> {
        self.records.read().map_err(|_| StoreError::Persistence {
            message: "record lock poisoned".into(),
        })
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, record: NewRecord) -> Result<Record> {
        let row = Record {
            id: RecordId::generate(),
            dataset_id: record.dataset_id,
            blob_id: record.blob_id,
            byte_size: record.byte_size,
            format: record.format,
            metadata: record.metadata,
            is_processed: false,
            created_at: Utc::now(),
        };
        self.write_lock()?.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_blob(&self, blob_id: &BlobId) -> Result<Option<Record>> {
        Ok(self
            .read_lock()?
            .values()
            .find(|r| &r.blob_id == blob_id)
            .cloned())
    }

    async fn find_pending(&self, dataset_id: &DatasetId) -> Result<Vec<Record>> {
        Ok(self
            .read_lock()?
            .values()
            .filter(|r| &r.dataset_id == dataset_id && !r.is_processed)
            .cloned()
            .collect())
    }

    async fn datasets_with_pending(&self) -> Result<Vec<DatasetId>> {
        let records = self.read_lock()?;
        let mut ids: Vec<DatasetId> = records
            .values()
            .filter(|r| !r.is_processed)
            .map(|r| r.dataset_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn mark_processed(&self, record_ids: &[RecordId]) -> Result<()> {
        let mut records = self.write_lock()?;
        for id in record_ids {
            if let Some(record) = records.get_mut(id) {
                record.is_processed = true;
            }
        }
        Ok(())
    }

    async fn delete_processed(&self, record_ids: &[RecordId]) -> Result<()> {
        let mut records = self.write_lock()?;
        for id in record_ids {
            if records.get(id).is_some_and(|r| r.is_processed) {
                records.remove(id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record(dataset_id: DatasetId, blob: &str, size: u64) -> NewRecord {
        NewRecord {
            dataset_id,
            blob_id: BlobId::new(blob),
            byte_size: size,
            format: "json".into(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn created_records_start_unprocessed() {
        let store = MemoryRecordStore::new();
        let dataset = DatasetId::generate();

        let record = store
            .create(new_record(dataset, "blob-a", 10))
            .await
            .expect("create");

        assert!(!record.is_processed);
        assert_eq!(store.find_pending(&dataset).await.expect("pending").len(), 1);
    }

    #[tokio::test]
    async fn find_pending_preserves_insertion_order() {
        let store = MemoryRecordStore::new();
        let dataset = DatasetId::generate();

        // Enough creations to land many in the same millisecond.
        for i in 0..100u64 {
            store
                .create(new_record(dataset, &format!("blob-{i:03}"), i))
                .await
                .expect("create");
        }

        let pending = store.find_pending(&dataset).await.expect("pending");
        let blobs: Vec<String> = pending.iter().map(|r| r.blob_id.to_string()).collect();
        let expected: Vec<String> = (0..100u64).map(|i| format!("blob-{i:03}")).collect();
        assert_eq!(blobs, expected);
    }

    #[tokio::test]
    async fn mark_processed_is_idempotent() {
        let store = MemoryRecordStore::new();
        let dataset = DatasetId::generate();
        let record = store
            .create(new_record(dataset, "blob-a", 10))
            .await
            .expect("create");

        store.mark_processed(&[record.id]).await.expect("mark");
        store.mark_processed(&[record.id]).await.expect("mark again");
        // Marking an unknown record is also a no-op.
        store
            .mark_processed(&[RecordId::generate()])
            .await
            .expect("mark missing");

        assert!(store.find_pending(&dataset).await.expect("pending").is_empty());
    }

    #[tokio::test]
    async fn delete_skips_unprocessed_records() {
        let store = MemoryRecordStore::new();
        let dataset = DatasetId::generate();
        let processed = store
            .create(new_record(dataset, "blob-a", 10))
            .await
            .expect("create");
        let pending = store
            .create(new_record(dataset, "blob-b", 20))
            .await
            .expect("create");

        store.mark_processed(&[processed.id]).await.expect("mark");
        store
            .delete_processed(&[processed.id, pending.id])
            .await
            .expect("delete");

        // Unprocessed record survives; processed one is gone.
        let remaining = store.find_pending(&dataset).await.expect("pending");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, pending.id);
        assert!(store
            .find_by_blob(&BlobId::new("blob-a"))
            .await
            .expect("lookup")
            .is_none());
    }

    #[tokio::test]
    async fn datasets_with_pending_is_distinct() {
        let store = MemoryRecordStore::new();
        let a = DatasetId::generate();
        let b = DatasetId::generate();

        store.create(new_record(a, "blob-1", 1)).await.expect("create");
        store.create(new_record(a, "blob-2", 2)).await.expect("create");
        store.create(new_record(b, "blob-3", 3)).await.expect("create");

        let mut expected = vec![a, b];
        expected.sort_unstable();
        assert_eq!(
            store.datasets_with_pending().await.expect("distinct"),
            expected
        );
    }
}
