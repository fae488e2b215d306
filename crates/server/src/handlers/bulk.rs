//! Batch endpoints.

use crate::auth::presented_key;
use crate::batch::{self, BulkMintRequest, BulkMintResponse, BulkUpdateRequest, BulkUpdateResponse, QueryItem};
use crate::error::ApiResult;
use crate::handlers::common::read_json;
use crate::record::ArkRecord;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;

/// POST /bulk_query - Look up several records by exact key.
pub async fn bulk_query(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Vec<ArkRecord>>> {
    let items: Vec<QueryItem> = read_json(&body)?;
    let records = batch::query(state.metadata.as_ref(), &items).await?;
    Ok(Json(records))
}

/// POST /bulk_update - Update several records of one NAAN.
pub async fn bulk_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<BulkUpdateResponse>> {
    let request: BulkUpdateRequest = read_json(&body)?;
    let response =
        batch::update(state.metadata.as_ref(), presented_key(&headers), &request).await?;
    Ok(Json(response))
}

/// POST /bulk_mint - Mint several records under one NAAN.
pub async fn bulk_mint(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<BulkMintResponse>> {
    let request: BulkMintRequest = read_json(&body)?;
    let response = batch::mint(
        state.metadata.as_ref(),
        &state.minter,
        presented_key(&headers),
        &request,
    )
    .await?;
    Ok(Json(response))
}
