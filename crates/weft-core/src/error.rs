//! Error types and result aliases shared across weft components.
//!
//! These cover the blob-store and identifier layers. The pipeline crate
//! (`weft-store`) defines its own error enum and maps these into it with
//! contextual messages.

use std::fmt;

/// The result type used throughout the weft kernel.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in kernel operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the ID invalid.
        message: String,
    },

    /// A blob store operation failed.
    #[error("blob store error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The requested blob or resource was not found (or has expired).
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a not-found error for a typed resource.
    #[must_use]
    pub fn not_found(resource_type: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound(format!("{resource_type} with id {id}"))
    }

    /// Returns true when this error is a not-found condition.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
