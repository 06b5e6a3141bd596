//! Cookie fetch/delete endpoints.
//!
//! Identifiers appear either as a wildcard path segment
//! (`/cookiejar/seq/run1.cram`) or, for identifiers that start with `/`, via
//! the query string (`/cookiejar?identifier=/seq/run1.cram`). Path-captured
//! identifiers are used verbatim (no leading slash is added).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use monster_core::Cookie;
use monster_jar::CookieJar;
use serde::Deserialize;
use tracing::info;

use crate::state::AppState;

use super::{ApiError, RequireJsonAccept};

#[derive(Debug, Deserialize)]
pub struct IdentifierQuery {
    pub identifier: Option<String>,
}

/// Store reads/deletes go through the jar's retry policy, so hop off the
/// runtime onto a blocking thread.
async fn fetch_blocking(jar: Arc<CookieJar>, id: String) -> Result<Option<Cookie>, ApiError> {
    tokio::task::spawn_blocking(move || jar.fetch(&id))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(ApiError::from)
}

async fn delete_blocking(jar: Arc<CookieJar>, id: String) -> Result<(), ApiError> {
    tokio::task::spawn_blocking(move || jar.delete(&id))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(ApiError::from)
}

async fn get_impl(state: Arc<AppState>, id: String) -> Result<Json<Cookie>, ApiError> {
    let cookie = fetch_blocking(Arc::clone(&state.jar), id.clone())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no cookie for identifier {id}")))?;
    Ok(Json(cookie))
}

async fn delete_impl(state: Arc<AppState>, id: String) -> Result<StatusCode, ApiError> {
    delete_blocking(Arc::clone(&state.jar), id.clone()).await?;
    info!(identifier = %id, "cookie deleted via API");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_cookie(
    _accept: RequireJsonAccept,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Cookie>, ApiError> {
    get_impl(state, id).await
}

pub async fn get_cookie_by_query(
    _accept: RequireJsonAccept,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdentifierQuery>,
) -> Result<Json<Cookie>, ApiError> {
    let id = query
        .identifier
        .ok_or_else(|| ApiError::bad_request("identifier query parameter required"))?;
    get_impl(state, id).await
}

pub async fn delete_cookie(
    _accept: RequireJsonAccept,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    delete_impl(state, id).await
}

pub async fn delete_cookie_by_query(
    _accept: RequireJsonAccept,
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdentifierQuery>,
) -> Result<StatusCode, ApiError> {
    let id = query
        .identifier
        .ok_or_else(|| ApiError::bad_request("identifier query parameter required"))?;
    delete_impl(state, id).await
}
