//! Shared handler helpers.

use crate::error::{ApiError, ApiResult};
use arklet_core::Naan;
use axum::body::Bytes;
use serde::de::DeserializeOwned;

/// Parse a JSON request body.
pub fn read_json<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))
}

/// Store key for a NAAN. Values beyond the store's integer range cannot
/// name a registered authority.
pub fn naan_key(naan: Naan) -> ApiResult<i64> {
    i64::try_from(naan).map_err(|_| ApiError::BadRequest(format!("NAAN {naan} is out of range")))
}

/// Map a field validation failure onto a per-field 400.
pub fn field_error(err: arklet_core::Error) -> ApiError {
    match err {
        arklet_core::Error::InvalidField { field, reason } => ApiError::field(field, reason),
        other => other.into(),
    }
}
