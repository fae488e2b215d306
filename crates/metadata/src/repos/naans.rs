//! NAAN repository.

use crate::error::MetadataResult;
use crate::models::NaanRow;
use async_trait::async_trait;

/// Repository for naming authorities.
///
/// There is no update or delete: a NAAN is immutable once it exists.
#[async_trait]
pub trait NaanRepo: Send + Sync {
    /// Register a NAAN.
    async fn create_naan(&self, naan: &NaanRow) -> MetadataResult<()>;

    /// Get a NAAN by number.
    async fn get_naan(&self, naan: i64) -> MetadataResult<Option<NaanRow>>;

    /// List every registered NAAN.
    async fn list_naans(&self) -> MetadataResult<Vec<NaanRow>>;
}
