//! API server implementation.
//!
//! Wires the blob store, record store, and dataset registry into the
//! pipeline services once at startup and serves them over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use weft_core::{BlobId, BlobStore, MemoryBlobStore, Result};
use weft_store::{
    AccessIssuer, Consolidator, DatasetReader, DatasetRegistry, IngestService, ManifestStore,
    MemoryAccessTokenStore, MemoryDatasetRegistry, MemoryRecordStore, RecordStore,
};

use crate::config::Config;

// ============================================================================
// Health and Ready Responses
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
    /// Optional message about readiness state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
    registry: Arc<dyn DatasetRegistry>,
    ingest: Arc<IngestService>,
    reader: Arc<DatasetReader>,
    consolidator: Arc<Consolidator>,
    access: Arc<AccessIssuer>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("blobs", &"<BlobStore>")
            .field("records", &"<RecordStore>")
            .field("registry", &"<DatasetRegistry>")
            .finish()
    }
}

impl AppState {
    /// Creates application state over the given stores.
    #[must_use]
    pub fn new(
        config: Config,
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
        registry: Arc<dyn DatasetRegistry>,
    ) -> Self {
        let ingest = Arc::new(IngestService::new(
            blobs.clone(),
            records.clone(),
            registry.clone(),
        ));
        let reader = Arc::new(DatasetReader::new(
            blobs.clone(),
            records.clone(),
            registry.clone(),
        ));
        let consolidator = Arc::new(Consolidator::new(
            records.clone(),
            registry.clone(),
            ManifestStore::new(blobs.clone()),
        ));
        let access = Arc::new(AccessIssuer::new(
            Arc::new(MemoryAccessTokenStore::new()),
            Duration::from_secs(config.access_token_ttl_secs),
        ));
        Self {
            config,
            blobs,
            records,
            registry,
            ingest,
            reader,
            consolidator,
            access,
        }
    }

    /// Creates application state with in-memory stores (tests/debug).
    #[must_use]
    pub fn with_memory_stores(config: Config) -> Self {
        Self::new(
            config,
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryRecordStore::new()),
            Arc::new(MemoryDatasetRegistry::new()),
        )
    }

    /// Returns the record store.
    #[must_use]
    pub fn records(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&self.records)
    }

    /// Returns the dataset registry.
    #[must_use]
    pub fn registry(&self) -> Arc<dyn DatasetRegistry> {
        Arc::clone(&self.registry)
    }

    /// Returns the ingestion service.
    #[must_use]
    pub fn ingest(&self) -> Arc<IngestService> {
        Arc::clone(&self.ingest)
    }

    /// Returns the dataset reader.
    #[must_use]
    pub fn reader(&self) -> Arc<DatasetReader> {
        Arc::clone(&self.reader)
    }

    /// Returns the consolidator.
    #[must_use]
    pub fn consolidator(&self) -> Arc<Consolidator> {
        Arc::clone(&self.consolidator)
    }

    /// Returns the access token issuer.
    #[must_use]
    pub fn access(&self) -> Arc<AccessIssuer> {
        Arc::clone(&self.access)
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint handler.
///
/// Returns 200 OK if the service is alive. This is a shallow check
/// that doesn't verify dependencies.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check endpoint handler.
///
/// A `head` on a missing blob is sufficient to validate the blob store
/// is reachable without listing or writing anything.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let probe = BlobId::new("__weft/ready-check");
    match state.blobs.head(&probe).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(format!("blob store check failed: {e}")),
            }),
        ),
    }
}

// ============================================================================
// Server
// ============================================================================

/// The weft API server.
pub struct Server {
    state: Arc<AppState>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.state.config)
            .finish()
    }
}

impl Server {
    /// Creates a new server over pre-built application state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Creates a new `ServerBuilder`.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// Returns the shared application state.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Creates the router with all routes and middleware.
    fn create_router(&self) -> Router {
        Router::new()
            .route("/healthz", get(health))
            .route("/readyz", get(ready))
            .nest("/api/v1", crate::routes::api_v1_routes())
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Starts the server and blocks until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind to the configured port.
    pub async fn serve(&self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.create_router();

        tracing::info!(
            http_port = self.state.config.http_port,
            debug = self.state.config.debug,
            "starting weft API server"
        );

        let listener =
            tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| weft_core::Error::Internal {
                    message: format!("failed to bind to {addr}: {e}"),
                })?;

        axum::serve(listener, router)
            .await
            .map_err(|e| weft_core::Error::Internal {
                message: format!("server error: {e}"),
            })?;

        Ok(())
    }

    /// Creates a test router for the server.
    ///
    /// Useful for integration tests that exercise routes without binding
    /// a port.
    #[doc(hidden)]
    pub fn test_router(&self) -> Router {
        self.create_router()
    }
}

/// Builder for constructing a server.
pub struct ServerBuilder {
    config: Config,
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
    registry: Arc<dyn DatasetRegistry>,
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            blobs: Arc::new(MemoryBlobStore::new()),
            records: Arc::new(MemoryRecordStore::new()),
            registry: Arc::new(MemoryDatasetRegistry::new()),
        }
    }
}

impl ServerBuilder {
    /// Creates a new server builder with in-memory stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP port.
    #[must_use]
    pub fn http_port(mut self, port: u16) -> Self {
        self.config.http_port = port;
        self
    }

    /// Enables debug mode.
    #[must_use]
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the blob store used by request handlers.
    #[must_use]
    pub fn blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = blobs;
        self
    }

    /// Sets the record store used by request handlers.
    #[must_use]
    pub fn record_store(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = records;
        self
    }

    /// Sets the dataset registry used by request handlers.
    #[must_use]
    pub fn dataset_registry(mut self, registry: Arc<dyn DatasetRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        Server::new(AppState::new(
            self.config,
            self.blobs,
            self.records,
            self.registry,
        ))
    }
}
