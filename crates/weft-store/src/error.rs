//! Error types for weft-store operations.

use thiserror::Error;

/// Result type alias for store and pipeline operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the record store, registry, or pipeline.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Blob store I/O failed.
    #[error("blob store error: {message}")]
    Blob {
        /// Description of the blob store failure.
        message: String,
    },

    /// Record store or registry persistence failed.
    #[error("persistence error: {message}")]
    Persistence {
        /// Description of the persistence failure.
        message: String,
    },

    /// Manifest bytes did not parse as a valid manifest.
    #[error("decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    /// Resource not found.
    #[error("not found: {message}")]
    NotFound {
        /// Description of what was not found.
        message: String,
    },

    /// Malformed input was rejected before any side effect.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the rejected input.
        message: String,
    },

    /// An access token's expiry has passed.
    #[error("access token expired: {message}")]
    TokenExpired {
        /// Description of the expired token.
        message: String,
    },

    /// An access token was already redeemed.
    #[error("access token already used: {message}")]
    TokenUsed {
        /// Description of the consumed token.
        message: String,
    },
}

impl StoreError {
    /// Returns true when this error is a not-found condition.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
