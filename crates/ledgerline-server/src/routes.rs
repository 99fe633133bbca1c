// ledgerline-server/src/routes.rs
// ============================================================================
// Module: Ledgerline HTTP Routes
// Description: axum router and handlers for the Ledgerline JSON API.
// Purpose: Map HTTP requests onto the ingest service.
// Dependencies: ledgerline-core, axum, serde_json, tokio
// ============================================================================

//! ## Overview
//! Handlers parse request bodies themselves so malformed input is always a
//! `400`. Service calls are synchronous and run on the blocking pool.
//!
//! | Outcome | Status |
//! |---|---|
//! | validation failure, malformed body | `400` |
//! | entity has no versions | `404` |
//! | content collision | `409` |
//! | body over `server.max_body_bytes` | `413` |
//! | storage unavailable | `503` |

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use ledgerline_core::IngestService;
use ledgerline_core::ServiceError;
use ledgerline_core::StoreReceipt;
use ledgerline_core::Version;
use ledgerline_core::WatchRequest;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Content type for payloads whose media type is not recognized.
const OCTET_STREAM: &str = "application/octet-stream";
/// Response header carrying the version of a returned payload.
const VERSION_HEADER: &str = "x-ledgerline-version";

// ============================================================================
// SECTION: Router
// ============================================================================

/// Shared handler state.
#[derive(Clone)]
struct ApiState {
    /// Ingest, read, and watch operations.
    service: IngestService,
}

/// Builds the API router over `service`, rejecting bodies larger than
/// `max_body_bytes`.
#[must_use]
pub fn router(service: IngestService, max_body_bytes: usize) -> Router {
    let state = Arc::new(ApiState {
        service,
    });
    Router::new()
        .route("/entity/{entity}", post(store_entity).put(store_entity).get(read_entity))
        .route("/entity/{entity}/history", get(entity_history))
        .route("/entity/{entity}/watch", post(watch_entity))
        .route("/entity/{entity}/unwatch", post(unwatch_entity))
        .route("/entity-ptr/{entity}", post(store_pointer).get(read_pointer))
        .route("/watchMultiple", post(watch_multiple))
        .route("/unwatchMultiple", post(unwatch_multiple))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

// ============================================================================
// SECTION: Request and Response Bodies
// ============================================================================

/// Query parameters accepted by store endpoints.
#[derive(Debug, Default, Deserialize)]
struct StoreQuery {
    /// Caller-supplied version.
    version: Option<u64>,
}

/// Query parameters accepted by the history endpoint.
#[derive(Debug, Default, Deserialize)]
struct HistoryQuery {
    /// Maximum entries to return.
    limit: Option<usize>,
}

/// Body of single watch and unwatch requests.
#[derive(Debug, Deserialize)]
struct UrlBody {
    /// Watcher endpoint.
    url: String,
}

/// Body of batch watch and unwatch requests.
#[derive(Debug, Deserialize)]
struct BatchBody {
    /// Entity and URL pairs.
    to_watch: Vec<WatchRequest>,
}

/// One history entry.
#[derive(Debug, Serialize)]
struct HistoryItem {
    /// Entity version.
    vsn: Version,
    /// Base64 content pointer.
    pointer: String,
}

/// History response body.
#[derive(Debug, Serialize)]
struct HistoryResponse {
    /// Entries, most recent first.
    history: Vec<HistoryItem>,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Stores a JSON payload under an entity.
async fn store_entity(
    State(state): State<Arc<ApiState>>,
    Path(entity): Path<String>,
    Query(query): Query<StoreQuery>,
    body: Bytes,
) -> Result<Json<StoreReceipt>, ApiError> {
    let payload: Value = parse_json(&body)?;
    let version = query.version.map(Version::new);
    let receipt =
        call_service(&state, move |service| service.store_json(&entity, &payload, version))
            .await?;
    Ok(Json(receipt))
}

/// Records an existing pointer (the raw body) as a new version.
async fn store_pointer(
    State(state): State<Arc<ApiState>>,
    Path(entity): Path<String>,
    Query(query): Query<StoreQuery>,
    body: Bytes,
) -> Result<Json<StoreReceipt>, ApiError> {
    let version = query.version.map(Version::new);
    let receipt =
        call_service(&state, move |service| service.store_pointer(&entity, &body, version))
            .await?;
    Ok(Json(receipt))
}

/// Returns the latest payload with its sniffed media type.
async fn read_entity(
    State(state): State<Arc<ApiState>>,
    Path(entity): Path<String>,
) -> Result<Response, ApiError> {
    let read = call_service(&state, move |service| service.read(&entity))
        .await?
        .ok_or_else(ApiError::not_found)?;
    let mut response = read.bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(read.media_type.unwrap_or(OCTET_STREAM)));
    headers.insert(VERSION_HEADER, HeaderValue::from(read.version.get()));
    Ok(response)
}

/// Returns the raw latest pointer bytes.
async fn read_pointer(
    State(state): State<Arc<ApiState>>,
    Path(entity): Path<String>,
) -> Result<Response, ApiError> {
    let entry = call_service(&state, move |service| service.read_pointer(&entity))
        .await?
        .ok_or_else(ApiError::not_found)?;
    let mut response = entry.fingerprint.into_bytes().into_response();
    response.headers_mut().insert(VERSION_HEADER, HeaderValue::from(entry.version.get()));
    Ok(response)
}

/// Returns version history, most recent first.
async fn entity_history(
    State(state): State<Arc<ApiState>>,
    Path(entity): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let entries = call_service(&state, move |service| service.history(&entity, query.limit)).await?;
    let history = entries
        .into_iter()
        .map(|entry| HistoryItem {
            vsn: entry.version,
            pointer: entry.fingerprint.to_base64(),
        })
        .collect();
    Ok(Json(HistoryResponse {
        history,
    }))
}

/// Registers a watcher on an entity.
async fn watch_entity(
    State(state): State<Arc<ApiState>>,
    Path(entity): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: UrlBody = parse_json(&body)?;
    call_service(&state, move |service| service.watch(&entity, &request.url)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Removes a watcher from an entity.
async fn unwatch_entity(
    State(state): State<Arc<ApiState>>,
    Path(entity): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: UrlBody = parse_json(&body)?;
    call_service(&state, move |service| service.unwatch(&entity, &request.url)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Registers a batch of watchers.
async fn watch_multiple(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: BatchBody = parse_json(&body)?;
    call_service(&state, move |service| service.watch_many(&request.to_watch)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Removes a batch of watchers.
async fn unwatch_multiple(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: BatchBody = parse_json(&body)?;
    call_service(&state, move |service| service.unwatch_many(&request.to_watch)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Liveness check.
async fn healthz() -> Json<Value> {
    Json(json!({"health": true}))
}

/// Readiness check. Not ready while the signal queue is unreachable.
async fn readyz(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<Value>) {
    let service = state.service.clone();
    let reachable = tokio::task::spawn_blocking(move || service.backend().signals.pending())
        .await
        .is_ok_and(|pending| pending.is_ok());
    if reachable {
        (StatusCode::OK, Json(json!({"ready": true})))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"ready": false})))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error response carrying an HTTP status.
#[derive(Debug)]
struct ApiError {
    /// Response status.
    status: StatusCode,
    /// Message returned as `{"error": ...}`.
    message: String,
}

impl ApiError {
    /// Builds a `400` error.
    const fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }

    /// Builds a `404` error.
    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "entity not found".to_string(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::Validation(_) | ServiceError::Encoding(_) => StatusCode::BAD_REQUEST,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a JSON request body.
fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request(format!("invalid json body: {err}")))
}

/// Runs a synchronous service call on the blocking pool.
async fn call_service<T, F>(state: &ApiState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&IngestService) -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    let service = state.service.clone();
    tokio::task::spawn_blocking(move || op(&service))
        .await
        .map_err(|err| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("service task join failed: {err}"),
        })?
        .map_err(ApiError::from)
}
