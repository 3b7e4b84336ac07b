//! # weft-core
//!
//! Shared kernel for the weft dataset storage service.
//!
//! This crate holds the pieces every other weft crate depends on:
//!
//! - **Error taxonomy**: structured errors for blob and identifier failures
//! - **Typed identifiers**: ULID-backed [`DatasetId`] and [`RecordId`],
//!   plus the opaque store-assigned [`BlobId`]
//! - **Blob store contract**: the [`BlobStore`] trait all backends
//!   implement, with an in-memory backend for tests and debug runs
//! - **Observability**: logging initialization and span constructors

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod blob;
pub mod error;
pub mod id;
pub mod observability;

pub use blob::{BlobId, BlobMeta, BlobStore, MemoryBlobStore, PutOptions};
pub use error::{Error, Result};
pub use id::{DatasetId, RecordId};
