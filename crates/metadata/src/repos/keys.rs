//! API key repository.

use crate::error::MetadataResult;
use crate::models::KeyRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for API keys.
#[async_trait]
pub trait KeyRepo: Send + Sync {
    /// Store a new key.
    async fn create_key(&self, key: &KeyRow) -> MetadataResult<()>;

    /// Active keys of a NAAN.
    async fn list_active_keys(&self, naan: i64) -> MetadataResult<Vec<KeyRow>>;

    /// All keys of a NAAN, active or not.
    async fn list_keys(&self, naan: i64) -> MetadataResult<Vec<KeyRow>>;

    /// Deactivate a key. Returns `NotFound` for unknown or already inactive keys.
    async fn deactivate_key(&self, key_id: Uuid, at: OffsetDateTime) -> MetadataResult<()>;
}
