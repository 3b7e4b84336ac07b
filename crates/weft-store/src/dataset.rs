//! Dataset registry.
//!
//! A [`Dataset`] is the aggregate container records are ingested into.
//! Its consolidation fields (`manifest_blob_id`, `total_record_count`,
//! `total_byte_size`, `last_consolidated_at`) are updated only by
//! successful consolidation runs, through a single atomic
//! [`DatasetRegistry::record_consolidation`] call, the commit point of
//! the pipeline.
//!
//! INVARIANT: `manifest_blob_id`, when present, resolves to a manifest
//! whose blob-ID list is a superset of every previously consolidated
//! record for the dataset. The aggregates are monotonically
//! non-decreasing.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use weft_core::{BlobId, DatasetId};

use crate::error::{Result, StoreError};

/// A purchasable dataset built from many consolidated records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Unique identifier.
    pub id: DatasetId,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Expected content format of submitted records.
    pub format: String,
    /// Free-form discovery tags.
    pub tags: Vec<String>,
    /// Whether the dataset is publicly listed.
    pub is_public: bool,
    /// Purchase price in wei.
    pub price: u64,
    /// The most recent consolidated manifest blob, if any run has
    /// completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_blob_id: Option<BlobId>,
    /// Total records ever folded into a manifest.
    pub total_record_count: u64,
    /// Total declared bytes ever folded into a manifest.
    pub total_byte_size: u64,
    /// When the last successful consolidation run finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_consolidated_at: Option<DateTime<Utc>>,
    /// When the dataset was registered.
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when registering a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDataset {
    /// Display name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Expected content format of submitted records.
    pub format: String,
    /// Free-form discovery tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether the dataset is publicly listed.
    #[serde(default)]
    pub is_public: bool,
    /// Purchase price in wei.
    #[serde(default)]
    pub price: u64,
}

/// The atomic aggregate update applied at the consolidation commit point.
#[derive(Debug, Clone)]
pub struct ConsolidationUpdate {
    /// The freshly written manifest blob.
    pub manifest_blob_id: BlobId,
    /// Records folded in by this run.
    pub added_record_count: u64,
    /// Declared bytes folded in by this run.
    pub added_byte_size: u64,
    /// Run completion time.
    pub consolidated_at: DateTime<Utc>,
}

/// Persistence contract for dataset aggregates.
///
/// `record_consolidation` must be a single-document atomic update so
/// concurrent runs across *different* datasets never interfere.
/// Serializing runs against the *same* dataset is the caller's job (see
/// the consolidator's per-dataset locks).
#[async_trait]
pub trait DatasetRegistry: Send + Sync + 'static {
    /// Registers a new dataset with zeroed aggregates.
    async fn create(&self, dataset: NewDataset) -> Result<Dataset>;

    /// Fetches a dataset by ID.
    async fn get(&self, id: &DatasetId) -> Result<Dataset>;

    /// Lists all datasets.
    async fn list(&self) -> Result<Vec<Dataset>>;

    /// Lists publicly visible datasets.
    async fn list_public(&self) -> Result<Vec<Dataset>>;

    /// Atomically applies a consolidation run's aggregate update:
    /// replaces the manifest pointer and increments the counters.
    ///
    /// Once this returns `Ok`, the run's records are considered folded
    /// in regardless of what happens afterwards.
    async fn record_consolidation(
        &self,
        id: &DatasetId,
        update: ConsolidationUpdate,
    ) -> Result<Dataset>;
}

/// In-memory dataset registry for testing and debug deployments.
#[derive(Debug, Default)]
pub struct MemoryDatasetRegistry {
    datasets: Arc<RwLock<BTreeMap<DatasetId, Dataset>>>,
}

impl MemoryDatasetRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn write_lock(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<DatasetId, Dataset>>> {
        self.datasets.write().map_err(|_| StoreError::Persistence {
            message: "dataset lock poisoned".into(),
        })
    }

    fn read_lock(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<DatasetId, Dataset>>> {
        self.datasets.read().map_err(|_| StoreError::Persistence {
            message: "dataset lock poisoned".into(),
        })
    }
}

#[async_trait]
impl DatasetRegistry for MemoryDatasetRegistry {
    async fn create(&self, dataset: NewDataset) -> Result<Dataset> {
        let row = Dataset {
            id: DatasetId::generate(),
            name: dataset.name,
            description: dataset.description,
            format: dataset.format,
            tags: dataset.tags,
            is_public: dataset.is_public,
            price: dataset.price,
            manifest_blob_id: None,
            total_record_count: 0,
            total_byte_size: 0,
            last_consolidated_at: None,
            created_at: Utc::now(),
        };
        self.write_lock()?.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get(&self, id: &DatasetId) -> Result<Dataset> {
        self.read_lock()?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                message: format!("dataset with id {id}"),
            })
    }

    async fn list(&self) -> Result<Vec<Dataset>> {
        Ok(self.read_lock()?.values().cloned().collect())
    }

    async fn list_public(&self) -> Result<Vec<Dataset>> {
        Ok(self
            .read_lock()?
            .values()
            .filter(|d| d.is_public)
            .cloned()
            .collect())
    }

    async fn record_consolidation(
        &self,
        id: &DatasetId,
        update: ConsolidationUpdate,
    ) -> Result<Dataset> {
        let mut datasets = self.write_lock()?;
        let dataset = datasets.get_mut(id).ok_or_else(|| StoreError::NotFound {
            message: format!("dataset with id {id}"),
        })?;

        dataset.manifest_blob_id = Some(update.manifest_blob_id);
        dataset.total_record_count += update.added_record_count;
        dataset.total_byte_size += update.added_byte_size;
        dataset.last_consolidated_at = Some(update.consolidated_at);

        Ok(dataset.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_dataset(name: &str) -> NewDataset {
        NewDataset {
            name: name.into(),
            description: "test dataset".into(),
            format: "json".into(),
            tags: vec!["test".into()],
            is_public: true,
            price: 1_000,
        }
    }

    #[tokio::test]
    async fn created_dataset_has_zeroed_aggregates() {
        let registry = MemoryDatasetRegistry::new();
        let dataset = registry.create(new_dataset("orders")).await.expect("create");

        assert!(dataset.manifest_blob_id.is_none());
        assert_eq!(dataset.total_record_count, 0);
        assert_eq!(dataset.total_byte_size, 0);
        assert!(dataset.last_consolidated_at.is_none());
    }

    #[tokio::test]
    async fn unknown_dataset_is_not_found() {
        let registry = MemoryDatasetRegistry::new();
        let err = registry.get(&DatasetId::generate()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn record_consolidation_increments_aggregates() {
        let registry = MemoryDatasetRegistry::new();
        let dataset = registry.create(new_dataset("orders")).await.expect("create");
        let now = Utc::now();

        registry
            .record_consolidation(
                &dataset.id,
                ConsolidationUpdate {
                    manifest_blob_id: BlobId::new("manifest-1"),
                    added_record_count: 3,
                    added_byte_size: 60,
                    consolidated_at: now,
                },
            )
            .await
            .expect("first update");

        let updated = registry
            .record_consolidation(
                &dataset.id,
                ConsolidationUpdate {
                    manifest_blob_id: BlobId::new("manifest-2"),
                    added_record_count: 2,
                    added_byte_size: 20,
                    consolidated_at: now,
                },
            )
            .await
            .expect("second update");

        assert_eq!(updated.manifest_blob_id, Some(BlobId::new("manifest-2")));
        assert_eq!(updated.total_record_count, 5);
        assert_eq!(updated.total_byte_size, 80);
        assert_eq!(updated.last_consolidated_at, Some(now));
    }

    #[tokio::test]
    async fn public_listing_filters_private_datasets() {
        let registry = MemoryDatasetRegistry::new();
        registry.create(new_dataset("open")).await.expect("create");
        let mut private = new_dataset("closed");
        private.is_public = false;
        registry.create(private).await.expect("create");

        assert_eq!(registry.list().await.expect("list").len(), 2);
        let public = registry.list_public().await.expect("public");
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].name, "open");
    }
}
