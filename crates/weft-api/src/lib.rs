//! # weft-api
//!
//! HTTP composition layer for the weft blob-consolidation service.
//!
//! This crate provides the API surface for weft, handling:
//!
//! - **Routing**: record ingestion, dataset registry, and download endpoints
//! - **Service wiring**: composition of the stores and pipeline services
//! - **Scheduling**: the periodic consolidation loop
//! - **Observability**: request tracing and health checks
//!
//! ## Design Principles
//!
//! This crate is a **thin composition layer** with no domain policy.
//! All pipeline logic lives in `weft-store`.
//!
//! ## Endpoints
//!
//! ```text
//! GET  /healthz                                  - Health check
//! GET  /readyz                                   - Readiness check
//! POST /api/v1/records                           - Submit a record
//! GET  /api/v1/records/{blob_id}                 - Retrieve a record
//! GET  /api/v1/records/pending/{dataset_id}      - List pending records
//! POST /api/v1/datasets                          - Register a dataset
//! GET  /api/v1/datasets                          - List public datasets
//! GET  /api/v1/datasets/all                      - List all datasets
//! GET  /api/v1/datasets/{id}                     - Get a dataset
//! POST /api/v1/datasets/{id}/access              - Issue an access token
//! GET  /api/v1/datasets/{id}/access/{token}      - Redeem and download
//! POST /api/v1/consolidation/trigger             - Run consolidation now
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use weft_api::server::Server;
//!
//! let server = Server::builder()
//!     .http_port(8080)
//!     .debug(true)
//!     .build();
//!
//! server.serve().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod routes;
pub mod scheduler;
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{ApiError, ApiResult};
    pub use crate::server::Server;
}
