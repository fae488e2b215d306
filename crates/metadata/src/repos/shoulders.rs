//! Shoulder repository.

use crate::error::MetadataResult;
use crate::models::ShoulderRow;
use async_trait::async_trait;

/// Repository for shoulders.
#[async_trait]
pub trait ShoulderRepo: Send + Sync {
    /// Create a shoulder under an existing NAAN.
    async fn create_shoulder(&self, shoulder: &ShoulderRow) -> MetadataResult<()>;

    /// Get a shoulder by NAAN and shoulder string.
    async fn get_shoulder(&self, naan: i64, shoulder: &str)
    -> MetadataResult<Option<ShoulderRow>>;

    /// List shoulders of a NAAN.
    async fn list_shoulders(&self, naan: i64) -> MetadataResult<Vec<ShoulderRow>>;
}
