//! HTTP route handlers.

pub mod consolidation;
pub mod datasets;
pub mod records;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// `/api/v1` routes.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(records::routes())
        .merge(datasets::routes())
        .merge(consolidation::routes())
}
