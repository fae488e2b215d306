//! Identifier record repository.

use crate::error::MetadataResult;
use crate::models::{ArkRow, ShoulderCount};
use arklet_core::{ArkField, ArkUpdate};
use async_trait::async_trait;
use std::collections::BTreeSet;
use time::OffsetDateTime;

/// Repository for identifier records.
#[async_trait]
pub trait ArkRepo: Send + Sync {
    /// Insert a record. A taken primary key yields `AlreadyExists`.
    async fn create_ark(&self, ark: &ArkRow) -> MetadataResult<()>;

    /// Insert records in one transaction. Any taken key rolls back all of
    /// them and yields `AlreadyExists`.
    async fn create_arks(&self, arks: &[ArkRow]) -> MetadataResult<()>;

    /// Get a record by primary key.
    async fn get_ark(&self, ark: &str) -> MetadataResult<Option<ArkRow>>;

    /// Get every record whose key is in `keys`. Missing keys are omitted.
    async fn get_arks(&self, keys: &[String]) -> MetadataResult<Vec<ArkRow>>;

    /// Write all descriptive fields and `updated_at` of an existing record.
    async fn update_ark(&self, ark: &ArkRow) -> MetadataResult<()>;

    /// Apply one partial update per record key in one transaction, stamping
    /// `updated_at` with `at`. Each statement names the union of touched
    /// fields; a slot the record's own update leaves empty keeps the value
    /// the row holds when the statement runs. Records that do not exist are
    /// skipped. Returns the number of records updated.
    async fn update_arks(
        &self,
        updates: &[(String, ArkUpdate)],
        at: OffsetDateTime,
    ) -> MetadataResult<u64>;

    /// Number of records per shoulder of a NAAN.
    async fn count_arks_by_shoulder(&self, naan: i64) -> MetadataResult<Vec<ShoulderCount>>;

    /// Up to `limit` randomly chosen records under a shoulder.
    async fn sample_arks(
        &self,
        naan: i64,
        shoulder: &str,
        limit: u32,
    ) -> MetadataResult<Vec<ArkRow>>;

    /// Delete every record under a shoulder. Returns the number deleted.
    async fn delete_arks_for_shoulder(&self, naan: i64, shoulder: &str) -> MetadataResult<u64>;
}

/// Union of the fields touched by a set of updates.
pub(crate) fn touched_fields(updates: &[(String, ArkUpdate)]) -> BTreeSet<ArkField> {
    updates
        .iter()
        .flat_map(|(_, update)| update.touched())
        .collect()
}

/// Build the `SET` list for a partial update: one `COALESCE` assignment per
/// field, so a NULL bind keeps the current column value, then `updated_at`.
/// `placeholder(i)` renders the i-th bind parameter (1-based); the `WHERE`
/// key is parameter `fields.len() + 2`.
pub(crate) fn update_set_clause(
    fields: &BTreeSet<ArkField>,
    placeholder: impl Fn(usize) -> String,
) -> String {
    let mut assignments: Vec<String> = fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let column = field.as_str();
            format!("\"{column}\" = COALESCE({}, \"{column}\")", placeholder(i + 1))
        })
        .collect();
    assignments.push(format!("updated_at = {}", placeholder(fields.len() + 1)));
    assignments.join(", ")
}
