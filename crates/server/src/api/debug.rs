//! Debug introspection endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use monster_processor::WorkerDump;

use crate::state::AppState;

use super::RequireJsonAccept;

/// Per-worker state of the processor manager.
pub async fn threads(
    _accept: RequireJsonAccept,
    State(state): State<Arc<AppState>>,
) -> Json<Vec<WorkerDump>> {
    Json(state.manager.dump_workers())
}
