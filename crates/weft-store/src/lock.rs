//! Per-dataset mutual exclusion for consolidation runs.
//!
//! Two simultaneous consolidation runs over the same dataset can both
//! read the same pending set, write separate manifests, and race on the
//! registry update, silently losing one run's additions. The pipeline is
//! designed for a single active consolidator per process, so an
//! in-process keyed async mutex is sufficient; a multi-process
//! deployment would swap this for a storage-backed lease (CAS on a lock
//! object with TTL).
//!
//! Guards release on drop, covering every exit path including errors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use weft_core::DatasetId;

/// A keyed set of async mutexes, one per dataset.
#[derive(Debug, Default)]
pub struct DatasetLocks {
    inner: Mutex<HashMap<DatasetId, Arc<AsyncMutex<()>>>>,
}

impl DatasetLocks {
    /// Creates an empty lock set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for a dataset, waiting if another run holds it.
    ///
    /// The returned guard serializes consolidation per dataset; runs on
    /// distinct datasets proceed concurrently.
    ///
    /// # Panics
    ///
    /// Panics if the interior registry mutex is poisoned, which cannot
    /// happen outside of a panic while holding it.
    pub async fn acquire(&self, dataset_id: DatasetId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.inner.lock().expect("dataset lock registry poisoned");
            Arc::clone(
                map.entry(dataset_id)
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_dataset_is_serialized() {
        let locks = Arc::new(DatasetLocks::new());
        let dataset = DatasetId::generate();

        let guard = locks.acquire(dataset).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(dataset).await;
            })
        };

        // The second acquire must block while the first guard is held.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should finish after release")
            .expect("contender task");
    }

    #[tokio::test]
    async fn distinct_datasets_do_not_contend() {
        let locks = DatasetLocks::new();
        let _a = locks.acquire(DatasetId::generate()).await;
        // Acquiring a different dataset's lock must not block.
        let _b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(DatasetId::generate()),
        )
        .await
        .expect("no contention across datasets");
    }
}
