//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid ARK: {0}")]
    InvalidArk(String),

    #[error("invalid shoulder: {0}")]
    InvalidShoulder(String),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("integrity violation: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    #[error("credential error: {0}")]
    Credential(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
