//! The consolidation engine.
//!
//! Periodically (or on demand) folds every pending record's blob
//! reference into the dataset's consolidated manifest. The sequence per
//! dataset is:
//!
//! 1. Read the current manifest, if the dataset points at one
//! 2. Append the pending records' blob IDs (order-preserving, no dedup)
//! 3. Write a *new* manifest blob
//! 4. Atomically update the dataset aggregates (the commit point)
//! 5. Mark and delete the folded records (advisory cleanup)
//!
//! INVARIANT: the registry update in step 4 is the commit point. A crash
//! after the manifest write but before the commit orphans one manifest
//! blob and nothing else: the next run re-reads the old manifest and
//! re-appends the still-pending records. A crash after the commit leaves
//! marked-but-undeleted records at worst, which `find_pending` already
//! excludes. Either way no record is lost and no aggregate regresses.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use weft_core::observability::consolidation_span;
use weft_core::{BlobId, DatasetId};

use crate::dataset::{ConsolidationUpdate, DatasetRegistry};
use crate::error::{Result, StoreError};
use crate::lock::DatasetLocks;
use crate::manifest::ManifestStore;
use crate::metrics;
use crate::record::RecordStore;

/// Result of consolidating one dataset.
#[derive(Debug, Clone)]
pub struct ConsolidationOutcome {
    /// Records folded into the new manifest (zero for a no-op run).
    pub records_folded: usize,
    /// Declared bytes added to the dataset aggregate.
    pub bytes_added: u64,
    /// The new manifest blob, if one was written.
    pub manifest_blob_id: Option<BlobId>,
}

impl ConsolidationOutcome {
    fn noop() -> Self {
        Self {
            records_folded: 0,
            bytes_added: 0,
            manifest_blob_id: None,
        }
    }
}

/// Summary of a batch run over all datasets with pending records.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Datasets attempted (every dataset that had pending records).
    pub datasets_attempted: usize,
    /// Datasets whose run failed (logged, not propagated).
    pub datasets_failed: usize,
    /// Records folded across all successful runs.
    pub records_folded: usize,
}

/// Folds pending records into consolidated manifests.
///
/// All collaborators are injected; the consolidator holds no ambient
/// state beyond its per-dataset locks.
pub struct Consolidator {
    records: Arc<dyn RecordStore>,
    registry: Arc<dyn DatasetRegistry>,
    manifests: ManifestStore,
    locks: DatasetLocks,
}

impl Consolidator {
    /// Creates a new consolidator over the given stores.
    #[must_use]
    pub fn new(
        records: Arc<dyn RecordStore>,
        registry: Arc<dyn DatasetRegistry>,
        manifests: ManifestStore,
    ) -> Self {
        Self {
            records,
            registry,
            manifests,
            locks: DatasetLocks::new(),
        }
    }

    /// Consolidates every dataset that has pending records.
    ///
    /// A failure on one dataset is logged and does not abort the others.
    pub async fn run_all(&self) -> Result<RunSummary> {
        let dataset_ids = self.records.datasets_with_pending().await?;
        tracing::info!(
            datasets = dataset_ids.len(),
            "starting consolidation batch"
        );

        let mut summary = RunSummary {
            datasets_attempted: dataset_ids.len(),
            ..RunSummary::default()
        };

        for dataset_id in dataset_ids {
            match self.consolidate_dataset(&dataset_id).await {
                Ok(outcome) => {
                    summary.records_folded += outcome.records_folded;
                }
                Err(e) => {
                    summary.datasets_failed += 1;
                    tracing::error!(
                        dataset_id = %dataset_id,
                        error = %e,
                        "consolidation failed for dataset"
                    );
                }
            }
        }

        tracing::info!(
            attempted = summary.datasets_attempted,
            failed = summary.datasets_failed,
            records = summary.records_folded,
            "consolidation batch finished"
        );
        Ok(summary)
    }

    /// Consolidates one dataset's pending records into a new manifest.
    ///
    /// Safe to re-run at any time: with no pending records it is a
    /// strict no-op (no blob writes, no registry touch).
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset is unknown, if a store call other
    /// than the prior-manifest read fails, or if the manifest write or
    /// registry commit fails. An unreadable prior manifest (missing or
    /// undecodable) is logged and treated as empty rather than blocking
    /// the run.
    pub async fn consolidate_dataset(
        &self,
        dataset_id: &DatasetId,
    ) -> Result<ConsolidationOutcome> {
        let _guard = self.locks.acquire(*dataset_id).await;
        let span = consolidation_span(&dataset_id.to_string());
        let _enter = span.enter();
        let started = Instant::now();

        let result = self.consolidate_locked(dataset_id).await;
        match &result {
            Ok(outcome) => {
                metrics::record_consolidation(
                    outcome.records_folded as u64,
                    started.elapsed().as_secs_f64(),
                );
            }
            Err(_) => metrics::record_consolidation_failure(),
        }
        result
    }

    async fn consolidate_locked(&self, dataset_id: &DatasetId) -> Result<ConsolidationOutcome> {
        let dataset = self.registry.get(dataset_id).await?;

        let pending = self.records.find_pending(dataset_id).await?;
        if pending.is_empty() {
            tracing::debug!("no pending records, skipping");
            return Ok(ConsolidationOutcome::noop());
        }
        tracing::info!(pending = pending.len(), "consolidating pending records");

        // An unreadable prior manifest must never block the batch. Its
        // contents are sacrificed (accepted data loss, no dead-letter
        // path); blob-store I/O failures stay retryable and propagate.
        let mut blob_ids: Vec<BlobId> = match &dataset.manifest_blob_id {
            Some(manifest_id) => match self.manifests.read(manifest_id).await {
                Ok(manifest) => manifest.blob_ids,
                Err(e @ (StoreError::NotFound { .. } | StoreError::Decode { .. })) => {
                    tracing::warn!(
                        manifest_blob_id = %manifest_id,
                        error = %e,
                        "prior manifest unreadable, starting from empty"
                    );
                    Vec::new()
                }
                Err(e) => return Err(e),
            },
            None => Vec::new(),
        };

        blob_ids.extend(pending.iter().map(|r| r.blob_id.clone()));

        let new_manifest_id = self.manifests.write(blob_ids).await?;

        let added_byte_size: u64 = pending.iter().map(|r| r.byte_size).sum();
        let added_record_count = pending.len() as u64;

        // Commit point: once this single-document update lands, the
        // pending records are folded in no matter what happens next.
        self.registry
            .record_consolidation(
                dataset_id,
                ConsolidationUpdate {
                    manifest_blob_id: new_manifest_id.clone(),
                    added_record_count,
                    added_byte_size,
                    consolidated_at: Utc::now(),
                },
            )
            .await?;

        // Cleanup only. Failures here are logged, not surfaced: a
        // marked-but-undeleted record is already excluded from the next
        // run's pending set, and an unmarked one is re-folded under the
        // at-least-once contract.
        let record_ids: Vec<_> = pending.iter().map(|r| r.id).collect();
        if let Err(e) = self.records.mark_processed(&record_ids).await {
            tracing::warn!(error = %e, "failed to mark consolidated records processed");
        } else if let Err(e) = self.records.delete_processed(&record_ids).await {
            tracing::warn!(error = %e, "failed to delete processed records");
        }

        tracing::info!(
            records = added_record_count,
            bytes = added_byte_size,
            manifest_blob_id = %new_manifest_id,
            "consolidation committed"
        );

        Ok(ConsolidationOutcome {
            records_folded: pending.len(),
            bytes_added: added_byte_size,
            manifest_blob_id: Some(new_manifest_id),
        })
    }
}
