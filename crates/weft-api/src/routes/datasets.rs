//! Dataset registry and token-gated download routes.
//!
//! ## Routes
//!
//! - `POST /datasets` - Register a new dataset
//! - `GET  /datasets` - List publicly visible datasets
//! - `GET  /datasets/all` - List every dataset
//! - `GET  /datasets/{dataset_id}` - Get one dataset
//! - `POST /datasets/{dataset_id}/access` - Issue a single-use access token
//! - `GET  /datasets/{dataset_id}/access/{token}` - Redeem a token and
//!   download the consolidated contents

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::{HeaderValue, CONTENT_DISPOSITION};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use weft_core::DatasetId;
use weft_store::{Dataset, NewDataset};

use crate::error::ApiError;
use crate::server::AppState;

// ============================================================================
// Response Types
// ============================================================================

/// Response after issuing an access token.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct IssueAccessResponse {
    /// The opaque token string to present at download time.
    pub token: String,
    /// The dataset the token unlocks.
    pub dataset_id: DatasetId,
    /// When the token stops being redeemable.
    pub expires_at: DateTime<Utc>,
}

/// Response listing datasets.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDatasetsResponse {
    /// The datasets, newest first.
    pub datasets: Vec<Dataset>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Register a new dataset.
async fn create_dataset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewDataset>,
) -> Result<impl IntoResponse, ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    if request.format.trim().is_empty() {
        return Err(ApiError::bad_request("format is required"));
    }

    let dataset = state.registry().create(request).await?;
    tracing::info!(dataset_id = %dataset.id, name = %dataset.name, "dataset registered");

    Ok((StatusCode::CREATED, Json(dataset)))
}

/// List publicly visible datasets.
async fn list_public(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let datasets = state.registry().list_public().await?;
    Ok(Json(ListDatasetsResponse { datasets }))
}

/// List every dataset, public or not.
async fn list_all(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let datasets = state.registry().list().await?;
    Ok(Json(ListDatasetsResponse { datasets }))
}

/// Get one dataset by ID.
async fn get_dataset(
    State(state): State<Arc<AppState>>,
    Path(dataset_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let dataset_id: DatasetId = dataset_id.parse()?;
    let dataset = state.registry().get(&dataset_id).await?;
    Ok(Json(dataset))
}

/// Issue a single-use, time-boxed access token for a dataset.
///
/// Payment verification happens upstream of this endpoint; the token
/// only encodes the download grant.
async fn issue_access(
    State(state): State<Arc<AppState>>,
    Path(dataset_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let dataset_id: DatasetId = dataset_id.parse()?;

    // Don't mint tokens for datasets that don't exist.
    state.registry().get(&dataset_id).await?;

    let token = state.access().issue(dataset_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(IssueAccessResponse {
            token: token.token,
            dataset_id: token.dataset_id,
            expires_at: token.expires_at,
        }),
    ))
}

/// Redeem an access token and download the consolidated dataset.
///
/// The token is consumed even if the client aborts the download.
async fn download_with_access(
    State(state): State<Arc<AppState>>,
    Path((dataset_id, token)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let dataset_id: DatasetId = dataset_id.parse()?;

    let dataset = state.registry().get(&dataset_id).await?;
    state.access().redeem(&dataset_id, &token).await?;

    let download = state.reader().read_consolidated(&dataset_id).await?;
    tracing::info!(
        dataset_id = %dataset_id,
        total_users = download.total_users,
        valid_users = download.valid_users,
        "serving consolidated download"
    );

    let mut response = Json(download).into_response();
    let filename = format!("attachment; filename=\"{}.json\"", dataset.name);
    if let Ok(value) = HeaderValue::from_str(&filename) {
        response.headers_mut().insert(CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

// ============================================================================
// Router
// ============================================================================

/// Creates the dataset routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/datasets", post(create_dataset))
        .route("/datasets", get(list_public))
        .route("/datasets/all", get(list_all))
        .route("/datasets/{dataset_id}", get(get_dataset))
        .route("/datasets/{dataset_id}/access", post(issue_access))
        .route(
            "/datasets/{dataset_id}/access/{token}",
            get(download_with_access),
        )
}
