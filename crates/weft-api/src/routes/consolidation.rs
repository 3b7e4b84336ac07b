//! Manual consolidation trigger route.
//!
//! ## Routes
//!
//! - `POST /consolidation/trigger` - Run consolidation over every dataset
//!   with pending records

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use crate::error::ApiError;
use crate::server::AppState;

/// Response after a manual consolidation run.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    /// Datasets that had pending records and were attempted.
    pub processed_datasets: usize,
    /// Datasets whose run failed (details in the server log).
    pub failed_datasets: usize,
    /// Records folded across all successful runs.
    pub records_folded: usize,
}

/// Run consolidation over every dataset with pending records.
///
/// Per-dataset failures are isolated and reported in the counts, never
/// as an error status.
async fn trigger(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let summary = state.consolidator().run_all().await?;
    Ok(Json(TriggerResponse {
        processed_datasets: summary.datasets_attempted,
        failed_datasets: summary.datasets_failed,
        records_folded: summary.records_folded,
    }))
}

/// Creates the consolidation routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/consolidation/trigger", post(trigger))
}
