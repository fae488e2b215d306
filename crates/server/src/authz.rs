//! API key authorization.
//!
//! Every failure mode (unknown NAAN, no key presented, wrong key, inactive
//! key) produces the same `None`, which the handlers turn into one uniform
//! 403 response.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use arklet_core::Naan;
use arklet_core::credential::{MAX_SECRET_LEN, verify_secret};
use arklet_metadata::MetadataStore;
use uuid::Uuid;

/// Proof that a request holds an active key for a NAAN.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Authorized {
    pub naan: Naan,
    pub key_id: Uuid,
}

/// Check `presented` against every active key of `naan`.
///
/// Store failures propagate as errors; everything else that prevents a
/// match is `Ok(None)`.
pub async fn authorize(
    metadata: &dyn MetadataStore,
    naan: Naan,
    presented: Option<&str>,
) -> ApiResult<Option<Authorized>> {
    let Some(secret) = presented.filter(|s| !s.is_empty() && s.len() <= MAX_SECRET_LEN) else {
        return Ok(None);
    };
    let Ok(naan_key) = i64::try_from(naan) else {
        return Ok(None);
    };

    let candidates: Vec<(Uuid, String)> = metadata
        .list_active_keys(naan_key)
        .await?
        .into_iter()
        .map(|key| (key.key_id, key.key_hash))
        .collect();
    if candidates.is_empty() {
        return Ok(None);
    }

    // Argon2 verification blocks; run it on the blocking pool.
    let secret = secret.to_string();
    let matched = tokio::task::spawn_blocking(move || {
        candidates
            .into_iter()
            .find(|(_, hash)| verify_secret(&secret, hash))
            .map(|(key_id, _)| key_id)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("key verification task failed: {e}")))?;

    Ok(matched.map(|key_id| Authorized { naan, key_id }))
}

/// Like [`authorize`], but a missing match is a `Forbidden` error.
pub async fn require(
    metadata: &dyn MetadataStore,
    naan: Naan,
    presented: Option<&str>,
) -> ApiResult<Authorized> {
    match authorize(metadata, naan, presented).await? {
        Some(authorized) => {
            tracing::debug!(naan, key_id = %authorized.key_id, "request authorized");
            Ok(authorized)
        }
        None => {
            metrics::AUTH_FAILURES.inc();
            tracing::info!(naan, "authorization failed");
            Err(ApiError::Forbidden)
        }
    }
}
