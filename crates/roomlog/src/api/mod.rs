use axum::extract::rejection::QueryRejection;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::document::PublicDocument;
use crate::service::{RoomHeader, RoomService, RoomState, RoomUpdates, PLACEHOLDER_AUTHOR};
use crate::RoomError;

/// Axum state wrapper for the room service
#[derive(Clone)]
pub struct ApiState {
    service: Arc<RoomService>,
}

impl ApiState {
    /// Create a new API state
    pub fn new(service: Arc<RoomService>) -> Self {
        Self { service }
    }

    /// Get the room service
    pub fn service(&self) -> &Arc<RoomService> {
        &self.service
    }
}

/// Build the `/api` router over a room service.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>` so the
/// append handler can record the caller's address.
pub fn router(service: Arc<RoomService>) -> Router {
    let state = ApiState::new(service);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/rp", post(create_room))
        .route("/api/rp/{slug}", get(room_state))
        .route("/api/rp/{slug}/updates", get(room_updates))
        .route("/api/rp/{slug}/{collection}", post(send_document))
        .route("/api/user", post(create_user))
        .route("/api/user/verify", get(verify_user))
        .fallback(malformed)
        .with_state(state)
}

/// A [`RoomError`] crossing the HTTP boundary.
///
/// Every internal failure becomes a structured JSON error response; the
/// request handler itself never panics.
pub struct ApiError(pub RoomError);

impl From<RoomError> for ApiError {
    fn from(err: RoomError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RoomError::NotFound { .. } => StatusCode::NOT_FOUND,
            RoomError::Conflict { .. } => StatusCode::CONFLICT,
            RoomError::Validation { .. } => StatusCode::BAD_REQUEST,
            RoomError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn health() -> Json<JsonValue> {
    Json(json!({ "roomlog": "ok" }))
}

async fn create_room(
    State(state): State<ApiState>,
    Json(header): Json<RoomHeader>,
) -> ApiResult<Json<JsonValue>> {
    let created = state.service.create_room(header).await?;
    Ok(Json(json!({ "rpCode": created.slug })))
}

async fn room_state(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<RoomState>> {
    Ok(Json(state.service.snapshot(&slug).await?))
}

#[derive(Deserialize)]
struct UpdatesQuery {
    since: u64,
}

async fn room_updates(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
    query: Result<Query<UpdatesQuery>, QueryRejection>,
) -> ApiResult<Json<RoomUpdates>> {
    // a missing or non-numeric watermark is the caller's error, not ours
    let Query(query) =
        query.map_err(|e| RoomError::validation(format!("invalid since watermark: {e}")))?;
    Ok(Json(state.service.updates_since(&slug, query.since).await?))
}

async fn send_document(
    State(state): State<ApiState>,
    Path((slug, collection)): Path<(String, String)>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<JsonValue>,
) -> ApiResult<Json<PublicDocument>> {
    let doc = state
        .service
        .append_document(&slug, &collection, payload, addr.ip())
        .await?;
    Ok(Json(doc.public()))
}

/// Authentication is stubbed: every caller is the placeholder user.
async fn create_user() -> Json<JsonValue> {
    Json(json!({ "userid": PLACEHOLDER_AUTHOR, "token": "x" }))
}

async fn verify_user() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn malformed() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Malformed request" })),
    )
        .into_response()
}
