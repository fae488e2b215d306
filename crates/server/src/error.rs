//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::BTreeMap;

/// Message returned for every authorization failure, whatever the cause.
pub const FORBIDDEN_MESSAGE: &str = "invalid or missing API key";

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Per-field validation messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid or missing API key")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("could not allocate a unique name after {collisions} collisions")]
    AllocationExhausted { collisions: usize },

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] arklet_metadata::MetadataError),

    #[error("{0}")]
    Core(#[from] arklet_core::Error),
}

impl ApiError {
    /// A validation failure for a single field.
    pub fn field(field: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Validation {
            message: format!("invalid {field}: {reason}"),
            fields: BTreeMap::from([(field.to_string(), reason)]),
        }
    }

    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::BadRequest(_) => "bad_request",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::AllocationExhausted { .. } => "allocation_exhausted",
            Self::Integrity(_) => "integrity_violation",
            Self::Internal(_) => "internal_error",
            Self::Metadata(_) => "metadata_error",
            Self::Core(arklet_core::Error::Integrity { .. }) => "integrity_violation",
            Self::Core(_) => "bad_request",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AllocationExhausted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Integrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Metadata(e) => match e {
                arklet_metadata::MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                arklet_metadata::MetadataError::AlreadyExists(_) => StatusCode::CONFLICT,
                arklet_metadata::MetadataError::Constraint(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(arklet_core::Error::Integrity { .. })
            | Self::Core(arklet_core::Error::Credential(_))
            | Self::Core(arklet_core::Error::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Core(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn fields(&self) -> Option<BTreeMap<String, String>> {
        match self {
            Self::Validation { fields, .. } => Some(fields.clone()),
            Self::Core(arklet_core::Error::InvalidField { field, reason }) => {
                Some(BTreeMap::from([(field.to_string(), reason.clone())]))
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            fields: self.fields(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_is_uniform() {
        let err = ApiError::Forbidden;
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), FORBIDDEN_MESSAGE);
    }

    #[test]
    fn test_core_errors_map_to_client_or_server() {
        let invalid = ApiError::from(arklet_core::Error::InvalidArk("bad".to_string()));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let integrity = ApiError::from(arklet_core::Error::Integrity {
            expected: "a".to_string(),
            actual: "b".to_string(),
        });
        assert_eq!(integrity.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(integrity.code(), "integrity_violation");
    }

    #[test]
    fn test_field_errors_carry_field_map() {
        let err = ApiError::from(arklet_core::Error::InvalidField {
            field: "url",
            reason: "enter a valid URL".to_string(),
        });
        let fields = err.fields().unwrap();
        assert_eq!(fields["url"], "enter a valid URL");

        let err = ApiError::field("shoulder", "required");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.fields().unwrap()["shoulder"], "required");
    }

    #[test]
    fn test_exhaustion_message() {
        let err = ApiError::AllocationExhausted { collisions: 10 };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("10 collisions"));
    }
}
