//! `weft-api` binary entrypoint.
//!
//! Loads configuration from environment variables, wires the stores, and
//! starts the HTTP server plus the optional consolidation scheduler.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::time::Duration;

use anyhow::Result;

use weft_api::config::Config;
use weft_api::server::{AppState, Server};
use weft_core::observability::{init_logging, LogFormat};
use weft_store::metrics::register_metrics;

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    init_logging(choose_log_format(&config));
    register_metrics();

    if !config.debug {
        tracing::warn!(
            "no external blob store configured; running on in-memory stores. \
             All data is lost on restart."
        );
    }
    let state = AppState::with_memory_stores(config.clone());

    if let Some(secs) = config.consolidation_interval_secs {
        weft_api::scheduler::spawn(state.consolidator(), Duration::from_secs(secs));
    } else {
        tracing::info!("consolidation scheduler disabled; use the manual trigger endpoint");
    }

    let server = Server::new(state);
    server.serve().await?;
    Ok(())
}
