//! Periodic consolidation scheduler.
//!
//! A thin `tokio` interval loop around [`Consolidator::run_all`]. All
//! correctness lives in the consolidator; this task only decides when to
//! run and logs the outcome.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use weft_store::Consolidator;

/// Spawns the background consolidation loop.
///
/// The first run happens one full interval after startup. Run failures
/// are logged and the loop keeps going; the pipeline's at-least-once
/// contract means a failed run is simply retried next tick.
pub fn spawn(consolidator: Arc<Consolidator>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick of a tokio interval fires immediately.
        ticker.tick().await;

        tracing::info!(
            interval_secs = interval.as_secs(),
            "consolidation scheduler started"
        );

        loop {
            ticker.tick().await;
            match consolidator.run_all().await {
                Ok(summary) => {
                    tracing::info!(
                        attempted = summary.datasets_attempted,
                        failed = summary.datasets_failed,
                        records = summary.records_folded,
                        "scheduled consolidation run finished"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "scheduled consolidation run failed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;
    use weft_core::MemoryBlobStore;
    use weft_store::{
        DatasetRegistry, IngestRequest, IngestService, ManifestStore, MemoryDatasetRegistry,
        MemoryRecordStore, NewDataset, RecordStore,
    };

    #[tokio::test(start_paused = true)]
    async fn scheduler_folds_pending_records() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let records = Arc::new(MemoryRecordStore::new());
        let registry = Arc::new(MemoryDatasetRegistry::new());
        let ingest = IngestService::new(blobs.clone(), records.clone(), registry.clone());
        let consolidator = Arc::new(Consolidator::new(
            records.clone(),
            registry.clone(),
            ManifestStore::new(blobs.clone()),
        ));

        let dataset = registry
            .create(NewDataset {
                name: "orders".into(),
                description: String::new(),
                format: "json".into(),
                tags: Vec::new(),
                is_public: false,
                price: 0,
            })
            .await
            .expect("create dataset");

        ingest
            .store(IngestRequest {
                dataset_id: dataset.id,
                payload: Bytes::from("aa"),
                byte_size: 2,
                format: "json".into(),
                metadata: None,
            })
            .await
            .expect("ingest");

        let handle = spawn(consolidator, Duration::from_secs(60));

        // Advance paused time past one interval and let the run happen.
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        let pending = records.find_pending(&dataset.id).await.expect("pending");
        assert!(pending.is_empty(), "scheduler should have folded records");

        handle.abort();
    }
}
