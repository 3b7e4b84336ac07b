//! Record ingestion and retrieval routes.
//!
//! ## Routes
//!
//! - `POST /records` - Submit a record payload for a dataset
//! - `GET  /records/{blob_id}` - Retrieve one record by blob ID
//! - `GET  /records/pending/{dataset_id}` - List records awaiting consolidation

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use weft_core::{BlobId, DatasetId};
use weft_store::{IngestRequest, Record};

use crate::error::ApiError;
use crate::server::AppState;

const MAX_RECORD_BYTES: usize = 10 * 1024 * 1024;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to submit a record payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRecordRequest {
    /// Target dataset.
    pub dataset_id: String,
    /// Payload content.
    pub data: String,
    /// Declared payload size in bytes. Recorded as-is on the pending
    /// record; falls back to the payload length when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_size: Option<u64>,
    /// Content-format tag (e.g. `json`, `csv`).
    pub format: String,
    /// Optional submitter metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Response after storing a record.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct StoreRecordResponse {
    /// Store-assigned blob ID of the stored payload.
    pub blob_id: BlobId,
    /// Human-readable confirmation.
    pub message: String,
}

/// A single record's payload and bookkeeping fields.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    /// The blob holding the payload.
    pub blob_id: BlobId,
    /// Owning dataset.
    pub dataset_id: DatasetId,
    /// Content-format tag from ingestion.
    pub format: String,
    /// Payload, lossily decoded to UTF-8 for the JSON envelope.
    pub data: String,
    /// Submitter metadata, if any was attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Response listing a dataset's unconsolidated records.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRecordsResponse {
    /// The dataset queried.
    pub dataset_id: DatasetId,
    /// Records awaiting consolidation, in submission order.
    pub records: Vec<Record>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Submit a record payload for a dataset.
///
/// Writes the payload to the blob store and registers a pending record
/// for the next consolidation run.
async fn store_record(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StoreRecordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let dataset_id: DatasetId = request.dataset_id.parse()?;

    let byte_size = request.data_size.unwrap_or(request.data.len() as u64);
    let record = state
        .ingest()
        .store(IngestRequest {
            dataset_id,
            payload: Bytes::from(request.data),
            byte_size,
            format: request.format,
            metadata: request.metadata,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(StoreRecordResponse {
            blob_id: record.blob_id,
            message: "record stored and queued for consolidation".to_string(),
        }),
    ))
}

/// Retrieve one record's payload by blob ID.
async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(blob_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let blob_id = BlobId::new(blob_id);
    let payload = state.reader().retrieve_record(&blob_id).await?;

    Ok(Json(RecordResponse {
        blob_id: payload.blob_id,
        dataset_id: payload.dataset_id,
        format: payload.format,
        data: String::from_utf8_lossy(&payload.data).into_owned(),
        metadata: payload.metadata,
    }))
}

/// List a dataset's records awaiting consolidation.
async fn list_pending(
    State(state): State<Arc<AppState>>,
    Path(dataset_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let dataset_id: DatasetId = dataset_id.parse()?;

    // 404 for an unknown dataset rather than an empty list.
    state.registry().get(&dataset_id).await?;

    let records = state.records().find_pending(&dataset_id).await?;
    Ok(Json(PendingRecordsResponse {
        dataset_id,
        records,
    }))
}

// ============================================================================
// Router
// ============================================================================

/// Creates the record routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/records", post(store_record))
        .route("/records/{blob_id}", get(get_record))
        .route("/records/pending/{dataset_id}", get(list_pending))
        .layer(DefaultBodyLimit::max(MAX_RECORD_BYTES))
}
