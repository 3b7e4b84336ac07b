//! Observability infrastructure for weft.
//!
//! Structured logging with consistent spans across components. This
//! module provides initialization helpers and span constructors so the
//! pipeline, stores, and API layer all log with the same fields.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: controls log levels (e.g., `info`, `weft_store=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for a consolidation run over one dataset.
#[must_use]
pub fn consolidation_span(dataset_id: &str) -> Span {
    tracing::info_span!("consolidate", dataset_id = dataset_id)
}

/// Creates a span for record ingestion.
#[must_use]
pub fn ingest_span(dataset_id: &str) -> Span {
    tracing::info_span!("ingest", dataset_id = dataset_id)
}
