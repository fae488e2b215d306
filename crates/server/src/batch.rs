//! Multi-record query, update and mint.
//!
//! Each operation validates the whole request before touching the store, so
//! a rejected batch never leaves partial writes behind.

use crate::authz;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::minter::{MintRequest, Minter};
use crate::record::ArkRecord;
use arklet_core::{ArkFields, ArkId, ArkUpdate, MAX_BATCH_SIZE, Naan, Shoulder};
use arklet_metadata::MetadataStore;
use arklet_metadata::models::ArkRow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use time::OffsetDateTime;

/// One entry of a batch query.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct QueryItem {
    pub ark: String,
}

/// One entry of a batch update.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UpdateItem {
    pub ark: String,
    #[serde(flatten)]
    pub update: ArkUpdate,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BulkUpdateRequest {
    pub data: Vec<UpdateItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct BulkUpdateResponse {
    pub num_received: usize,
    pub num_updated: u64,
}

/// One entry of a batch mint.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MintItem {
    #[serde(default)]
    pub shoulder: Option<String>,
    #[serde(flatten)]
    pub update: ArkUpdate,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BulkMintRequest {
    pub naan: Naan,
    pub data: Vec<MintItem>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BulkMintResponse {
    pub num_received: usize,
    pub arks_created: Vec<ArkRecord>,
}

fn check_size(received: usize) -> ApiResult<()> {
    if received > MAX_BATCH_SIZE {
        return Err(ApiError::BadRequest(format!(
            "a batch may contain at most {MAX_BATCH_SIZE} records, got {received}"
        )));
    }
    Ok(())
}

fn parse_item(index: usize, ark: &str) -> ApiResult<ArkId> {
    ArkId::parse(ark).map_err(|e| ApiError::field(&format!("data[{index}].ark"), e.to_string()))
}

fn verify(row: &ArkRow) -> ApiResult<()> {
    row.verify()
        .map_err(|e| ApiError::Integrity(format!("stored record {}: {e}", row.ark)))
}

/// Look up every referenced record. Missing records are left out; the rest
/// come back in request order.
pub async fn query(metadata: &dyn MetadataStore, items: &[QueryItem]) -> ApiResult<Vec<ArkRecord>> {
    check_size(items.len())?;
    metrics::record_batch("query", items.len());

    let keys: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_item(i, &item.ark).map(|ark| ark.lookup_key()))
        .collect::<ApiResult<_>>()?;
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let unique: Vec<String> = keys
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let mut found: HashMap<String, ArkRow> = HashMap::with_capacity(unique.len());
    for row in metadata.get_arks(&unique).await? {
        verify(&row)?;
        found.insert(row.ark.clone(), row);
    }

    Ok(keys
        .iter()
        .filter_map(|key| found.get(key).cloned().map(ArkRecord::from))
        .collect())
}

/// Apply a set of partial updates, all under one NAAN, in one transaction.
pub async fn update(
    metadata: &dyn MetadataStore,
    presented: Option<&str>,
    request: &BulkUpdateRequest,
) -> ApiResult<BulkUpdateResponse> {
    let num_received = request.data.len();
    check_size(num_received)?;
    if num_received == 0 {
        return Err(ApiError::BadRequest("no records to update".to_string()));
    }
    metrics::record_batch("update", num_received);

    let arks: Vec<ArkId> = request
        .data
        .iter()
        .enumerate()
        .map(|(i, item)| parse_item(i, &item.ark))
        .collect::<ApiResult<_>>()?;
    let naan = arks[0].naan();
    if arks.iter().any(|ark| ark.naan() != naan) {
        return Err(ApiError::BadRequest(
            "all records in a batch update must share one NAAN".to_string(),
        ));
    }

    authz::require(metadata, naan, presented).await?;

    for (i, item) in request.data.iter().enumerate() {
        item.update.validate().map_err(|e| match e {
            arklet_core::Error::InvalidField { field, reason } => {
                ApiError::field(&format!("data[{i}].{field}"), reason)
            }
            other => other.into(),
        })?;
    }

    // Later entries for the same record win, field by field.
    let mut merged: BTreeMap<String, ArkUpdate> = BTreeMap::new();
    for (ark, item) in arks.iter().zip(&request.data) {
        merged
            .entry(ark.lookup_key())
            .or_default()
            .merge(&item.update);
    }

    let keys: Vec<String> = merged.keys().cloned().collect();
    for row in metadata.get_arks(&keys).await? {
        verify(&row)?;
    }

    // Only the values each entry supplies are written; the store keeps
    // every other column as it stands at commit time.
    let updates: Vec<(String, ArkUpdate)> = merged.into_iter().collect();
    let num_updated = metadata
        .update_arks(&updates, OffsetDateTime::now_utc())
        .await?;
    tracing::info!(naan, num_received, num_updated, "batch update applied");

    Ok(BulkUpdateResponse {
        num_received,
        num_updated,
    })
}

/// Mint one record per entry under `request.naan`, atomically.
pub async fn mint(
    metadata: &dyn MetadataStore,
    minter: &Minter,
    presented: Option<&str>,
    request: &BulkMintRequest,
) -> ApiResult<BulkMintResponse> {
    let num_received = request.data.len();
    check_size(num_received)?;
    metrics::record_batch("mint", num_received);

    let mut requests = Vec::with_capacity(num_received);
    for (i, item) in request.data.iter().enumerate() {
        let shoulder = item
            .shoulder
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::field(&format!("data[{i}].shoulder"), "this field is required"))?;
        let shoulder = Shoulder::new(shoulder)
            .map_err(|e| ApiError::field(&format!("data[{i}].shoulder"), e.to_string()))?;
        item.update.validate().map_err(|e| match e {
            arklet_core::Error::InvalidField { field, reason } => {
                ApiError::field(&format!("data[{i}].{field}"), reason)
            }
            other => other.into(),
        })?;
        requests.push(MintRequest {
            shoulder,
            fields: ArkFields::from_update(&item.update),
        });
    }

    let naan = request.naan;
    authz::require(metadata, naan, presented).await?;

    let naan_key = i64::try_from(naan)
        .map_err(|_| ApiError::BadRequest(format!("NAAN {naan} is out of range")))?;
    let shoulders: BTreeSet<&str> = requests.iter().map(|r| r.shoulder.as_str()).collect();
    for shoulder in shoulders {
        if metadata.get_shoulder(naan_key, shoulder).await?.is_none() {
            return Err(ApiError::field(
                "shoulder",
                format!("shoulder {shoulder} is not registered under NAAN {naan}"),
            ));
        }
    }

    let rows = minter.mint_batch(metadata, naan, &requests).await?;
    Ok(BulkMintResponse {
        num_received,
        arks_created: rows.into_iter().map(ArkRecord::from).collect(),
    })
}
