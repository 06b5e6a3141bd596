//! JSON API handlers.
//!
//! Every endpoint requires `application/json` in the `Accept` header (the
//! [`RequireJsonAccept`] extractor answers 406 otherwise) and responds with
//! JSON. Errors carry a JSON body of the form `{"error": "..."}`.

mod cookiejar;
mod debug;
mod queue;

pub use cookiejar::{delete_cookie, delete_cookie_by_query, get_cookie, get_cookie_by_query};
pub use debug::threads;
pub use queue::{queue_length, reprocess};

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use monster_jar::JarError;
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// JSON error response with an appropriate status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<JarError> for ApiError {
    fn from(e: JarError) -> Self {
        match e {
            JarError::NotFound { id } => Self::not_found(format!("no cookie for identifier {id}")),
            other => Self::internal(other.to_string()),
        }
    }
}

/// Rejects requests whose `Accept` header does not admit JSON.
pub struct RequireJsonAccept;

impl<S: Send + Sync> FromRequestParts<S> for RequireJsonAccept {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let accept = parts
            .headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let accepts_json = accept.split(',').any(|part| {
            let mime = part.split(';').next().unwrap_or("").trim();
            matches!(mime, "application/json" | "application/*" | "*/*")
        });

        if accepts_json {
            Ok(Self)
        } else {
            Err(ApiError {
                status: StatusCode::NOT_ACCEPTABLE,
                message: "Accept header must include application/json".to_string(),
            })
        }
    }
}

// ── Health ────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub queue_length: usize,
    pub workers_awaiting_cookie: usize,
}

pub async fn health(_accept: RequireJsonAccept, State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        queue_length: state.jar.queue_length(),
        workers_awaiting_cookie: state.manager.awaiting_cookie(),
    })
}
