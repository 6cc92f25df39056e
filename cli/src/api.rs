//! Read-only HTTP API over a [`BlockReader`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::error;

use chainmirror_core::{Block, BlockReader, MirrorError, SyncStatus};

const DEFAULT_RECENT: usize = 10;

#[derive(Clone)]
pub struct AppState {
    pub reader: BlockReader,
    pub status: watch::Receiver<SyncStatus>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/blocks/latest", get(latest))
        .route("/blocks/height/:height", get(by_height))
        .route("/blocks/hash/:hash", get(by_hash))
        .route("/blocks/recent", get(recent))
        .route("/blocks/range", get(range))
        .with_state(state)
}

/// Errors mapped to HTTP responses. Internal failures only reach the logs.
#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(String),
    Internal(MirrorError),
}

impl From<MirrorError> for ApiError {
    fn from(e: MirrorError) -> Self {
        match e {
            MirrorError::InvalidArgument(msg) => Self::BadRequest(msg),
            other => Self::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound => (StatusCode::NOT_FOUND, "block not found".to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(e) => {
                error!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Engine status plus the number of heights it trails the remote tip by.
async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = *state.status.borrow();
    Json(json!({
        "state": status.state,
        "last_known_height": status.last_known_height,
        "remote_tip": status.remote_tip,
        "lag": status.lag(),
    }))
}

async fn latest(State(state): State<AppState>) -> ApiResult<Block> {
    Ok(Json(state.reader.latest().await?))
}

async fn by_height(State(state): State<AppState>, Path(height): Path<u64>) -> ApiResult<Block> {
    state
        .reader
        .by_height(height)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn by_hash(State(state): State<AppState>, Path(hash): Path<String>) -> ApiResult<Block> {
    state
        .reader
        .by_hash(&hash)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

#[derive(Debug, Deserialize)]
struct RecentParams {
    n: Option<usize>,
}

async fn recent(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> ApiResult<Vec<Block>> {
    let n = params.n.unwrap_or(DEFAULT_RECENT);
    Ok(Json(state.reader.recent(n).await?))
}

#[derive(Debug, Deserialize)]
struct RangeParams {
    start: i64,
    end: i64,
}

async fn range(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Vec<Block>> {
    Ok(Json(state.reader.by_time_range(params.start, params.end).await?))
}
