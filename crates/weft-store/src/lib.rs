//! # weft-store
//!
//! Record store, dataset registry, and the blob consolidation pipeline.
//!
//! Many small user-submitted records are individually written to a
//! content store and later folded into one growing consolidated manifest
//! per dataset, trading per-item storage overhead for a periodic batch
//! merge. This crate implements that pipeline end to end:
//!
//! - **Ingestion**: payload → blob store, plus a pending [`Record`] row
//! - **Consolidation**: the [`Consolidator`] merges pending blob
//!   references into a new immutable [`Manifest`] and commits the
//!   dataset aggregates atomically
//! - **Retrieval**: single-record reads and best-effort consolidated
//!   downloads with partial-success counts
//! - **Access tokens**: time-boxed single-use grants gating downloads
//!
//! ## Consistency model
//!
//! The dataset registry update is the commit point of every run. The
//! manifest blob is written first (a crash before the commit only
//! orphans it), and record cleanup runs last (a crash there only leaves
//! already-excluded rows behind). Re-processing is at-least-once safe;
//! per-dataset locks serialize runs over the same dataset.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod access;
pub mod consolidator;
pub mod dataset;
pub mod error;
pub mod ingest;
pub mod lock;
pub mod manifest;
pub mod metrics;
pub mod reader;
pub mod record;

pub use access::{AccessIssuer, AccessToken, AccessTokenStore, MemoryAccessTokenStore};
pub use consolidator::{ConsolidationOutcome, Consolidator, RunSummary};
pub use dataset::{
    ConsolidationUpdate, Dataset, DatasetRegistry, MemoryDatasetRegistry, NewDataset,
};
pub use error::{Result, StoreError};
pub use ingest::{IngestRequest, IngestService};
pub use lock::DatasetLocks;
pub use manifest::{MANIFEST_TYPE, Manifest, ManifestStore};
pub use reader::{ConsolidatedDataset, ConsolidatedEntry, DatasetReader, RecordPayload};
pub use record::{MemoryRecordStore, NewRecord, Record, RecordStore};
