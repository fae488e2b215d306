//! Single-record mint and update.

use crate::auth::presented_key;
use crate::authz;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{field_error, naan_key, read_json};
use crate::minter::MintRequest;
use crate::record::ArkRecord;
use crate::state::AppState;
use arklet_core::ark::display_ark;
use arklet_core::{ArkFields, ArkId, ArkUpdate, Naan, Shoulder};
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Mint request body.
#[derive(Debug, Deserialize)]
pub struct MintBody {
    pub naan: Naan,
    #[serde(default)]
    pub shoulder: Option<String>,
    #[serde(flatten)]
    pub update: ArkUpdate,
}

/// Mint response.
#[derive(Debug, Serialize, Deserialize)]
pub struct MintResponse {
    /// `ark:/{naan}{shoulder}{assigned_name}`.
    pub ark: String,
}

/// Update request body.
#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    pub ark: String,
    #[serde(flatten)]
    pub update: ArkUpdate,
}

/// POST /mint - Allocate a new identifier under a registered shoulder.
pub async fn mint(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<MintResponse>> {
    let body: MintBody = read_json(&body)?;
    let naan = body.naan;
    authz::require(state.metadata.as_ref(), naan, presented_key(&headers)).await?;

    let shoulder = body
        .shoulder
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::field("shoulder", "this field is required"))?;
    let shoulder =
        Shoulder::new(shoulder).map_err(|e| ApiError::field("shoulder", e.to_string()))?;
    body.update.validate().map_err(field_error)?;

    if state
        .metadata
        .get_shoulder(naan_key(naan)?, shoulder.as_str())
        .await?
        .is_none()
    {
        return Err(ApiError::field(
            "shoulder",
            format!("shoulder {shoulder} is not registered under NAAN {naan}"),
        ));
    }

    let request = MintRequest {
        shoulder,
        fields: ArkFields::from_update(&body.update),
    };
    let row = state
        .minter
        .mint_one(state.metadata.as_ref(), naan, &request)
        .await?;

    Ok(Json(MintResponse {
        ark: display_ark(&row.ark),
    }))
}

/// PUT /update - Replace the provided descriptive fields of one record.
pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ArkRecord>> {
    let body: UpdateBody = read_json(&body)?;
    let ark = ArkId::parse(&body.ark).map_err(|e| ApiError::field("ark", e.to_string()))?;
    authz::require(state.metadata.as_ref(), ark.naan(), presented_key(&headers)).await?;
    body.update.validate().map_err(field_error)?;

    let key = ark.lookup_key();
    let mut row = state
        .metadata
        .get_ark(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("ark {}", display_ark(&key))))?;
    row.verify()
        .map_err(|e| ApiError::Integrity(format!("stored record {key}: {e}")))?;

    let mut fields = row.fields();
    body.update.apply(&mut fields);
    row.set_fields(fields);
    row.updated_at = OffsetDateTime::now_utc();
    state.metadata.update_ark(&row).await?;

    tracing::info!(ark = %row.ark, fields = ?body.update.touched(), "ark updated");
    Ok(Json(row.into()))
}
