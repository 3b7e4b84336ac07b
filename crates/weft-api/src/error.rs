//! API error types and HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use weft_core::Error as CoreError;
use weft_store::StoreError;

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// Standard JSON error response body.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message (safe for clients).
    pub message: String,
}

/// HTTP API error with stable machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Returns an error response for invalid input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Returns an error response for missing resources.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// Returns an error response for an expired access token.
    pub fn token_expired(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GONE, "TOKEN_EXPIRED", message)
    }

    /// Returns an error response for an already redeemed access token.
    pub fn token_used(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GONE, "TOKEN_USED", message)
    }

    /// Returns an internal error response.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Returns the human-readable error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiErrorBody {
                code: self.code.to_string(),
                message: self.message,
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation { message } => Self::bad_request(message),
            StoreError::NotFound { message } => Self::not_found(message),
            StoreError::TokenExpired { message } => Self::token_expired(message),
            StoreError::TokenUsed { message } => Self::token_used(message),
            StoreError::Blob { message }
            | StoreError::Persistence { message }
            | StoreError::Decode { message } => Self::internal(message),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidId { message } | CoreError::InvalidInput(message) => {
                Self::bad_request(message)
            }
            CoreError::NotFound(message) => Self::not_found(message),
            CoreError::Storage { message, .. } | CoreError::Internal { message } => {
                Self::internal(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_404() {
        let error = ApiError::from(StoreError::NotFound {
            message: "dataset abc".into(),
        });
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert_eq!(error.code(), "NOT_FOUND");
    }

    #[test]
    fn token_errors_map_to_gone_with_distinct_codes() {
        let expired = ApiError::from(StoreError::TokenExpired {
            message: "token t".into(),
        });
        let used = ApiError::from(StoreError::TokenUsed {
            message: "token t".into(),
        });
        assert_eq!(expired.status(), StatusCode::GONE);
        assert_eq!(used.status(), StatusCode::GONE);
        assert_ne!(expired.code(), used.code());
    }

    #[test]
    fn body_is_camel_case_json() {
        let response = ApiError::bad_request("format is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
