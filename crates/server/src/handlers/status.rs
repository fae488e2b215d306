//! Service status.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

/// Status response.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    /// `full` or `resolver`.
    pub mode: String,
}

/// GET / - Report liveness after checking the store.
pub async fn status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    state.metadata.health_check().await?;

    let mode = if state.config.server.resolver_only {
        "resolver"
    } else {
        "full"
    };
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: mode.to_string(),
    }))
}
