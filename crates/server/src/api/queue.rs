//! Queue endpoints: occupancy and forced reprocessing.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;

use super::{ApiError, RequireJsonAccept};

#[derive(Serialize)]
pub struct QueueLengthResponse {
    /// Waiting plus in-flight cookies.
    pub queue_length: usize,
}

pub async fn queue_length(
    _accept: RequireJsonAccept,
    State(state): State<Arc<AppState>>,
) -> Json<QueueLengthResponse> {
    Json(QueueLengthResponse {
        queue_length: state.jar.queue_length(),
    })
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReprocessRequest {
    pub path: String,
}

/// Queue a cookie for (re)processing regardless of new knowledge. An
/// in-flight cookie is re-queued once its current reservation is released.
pub async fn reprocess(
    _accept: RequireJsonAccept,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReprocessRequest>, JsonRejection>,
) -> Result<Json<ReprocessRequest>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.to_string()))?;
    if request.path.is_empty() {
        return Err(ApiError::bad_request("path must not be empty"));
    }

    info!(path = %request.path, "forced reprocess requested");
    state.jar.mark_dirty(&request.path);
    Ok(Json(request))
}
