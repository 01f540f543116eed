//! HTTP routes for the memory engine.
//!
//! Each handler is a thin adapter: pull `user_id` out of the path, parse the
//! query/body, call the matching `vestige_core::Engine` method, and map the
//! result onto a status code. Every route lives under `/api` except the two
//! liveness checks.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use vestige_core::error::EngineError;
use vestige_core::memory::{
    BulkIngestRequest, ContentType, ContextRequest, IngestRequest,
};
use vestige_core::Engine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn router(engine: Arc<Engine>) -> Router {
    let cors = build_cors(&engine.config().cors_allow_origins);
    let state = AppState { engine };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/health/{user_id}", get(health_report))
        .route("/api/memory/ingest/{user_id}", post(ingest))
        .route("/api/memory/ingest/{user_id}/bulk", post(ingest_bulk))
        .route("/api/memory/entries/{user_id}", get(list_entries))
        .route("/api/memory/entries/{user_id}/{entry_id}", get(get_entry))
        .route(
            "/api/memory/entries/{user_id}/{entry_id}",
            delete(delete_entry),
        )
        .route("/api/memory/stats/{user_id}", get(stats))
        .route("/api/memory/compact/{user_id}", post(compact))
        .route("/api/context/retrieve/{user_id}", post(retrieve_context))
        .route("/api/context/voice/{user_id}", get(voice_context))
        .route(
            "/api/context/suggest/{user_id}/{entry_id}",
            get(suggest_related),
        )
        .route("/api/context/preview", post(preview_context))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors(allowed: &[String]) -> CorsLayer {
    let origins: Vec<_> = allowed
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Maps an [`EngineError`] onto the status codes named for the route list.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            EngineError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            EngineError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            EngineError::Storage(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                self.0.to_string(),
            ),
            EngineError::Capability(_) => (StatusCode::BAD_GATEWAY, self.0.to_string()),
            EngineError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

async fn healthz() -> &'static str {
    "ok"
}

async fn health_report(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<vestige_core::memory::MemoryHealthReport>> {
    Ok(Json(state.engine.health_report(user_id).await?))
}

async fn ingest(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<IngestRequest>,
) -> ApiResult<Json<vestige_core::memory::IngestResponse>> {
    Ok(Json(state.engine.ingest(user_id, request).await?))
}

async fn ingest_bulk(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<BulkIngestRequest>,
) -> ApiResult<Json<vestige_core::memory::BulkIngestResponse>> {
    Ok(Json(state.engine.ingest_bulk(user_id, request).await?))
}

#[derive(Debug, Deserialize)]
struct ListEntriesQuery {
    content_type: Option<ContentType>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

async fn list_entries(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListEntriesQuery>,
) -> ApiResult<Json<Vec<vestige_core::memory::MemoryEntry>>> {
    Ok(Json(
        state
            .engine
            .list_entries(user_id, query.content_type, query.limit, query.offset)
            .await?,
    ))
}

async fn get_entry(
    State(state): State<AppState>,
    Path((user_id, entry_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    match state.engine.get_entry(user_id, entry_id).await? {
        Some(entry) => Ok(Json(entry).into_response()),
        None => Ok((StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response()),
    }
}

async fn delete_entry(
    State(state): State<AppState>,
    Path((user_id, entry_id)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let removed = state.engine.delete_entry(user_id, entry_id).await?;
    Ok(Json(json!({ "deleted": removed })))
}

async fn stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<vestige_core::memory::MemoryStats>> {
    Ok(Json(state.engine.stats(user_id).await?))
}

#[derive(Debug, Deserialize)]
struct CompactQuery {
    #[serde(default)]
    remove_stale: bool,
    #[serde(default)]
    merge_duplicates: bool,
}

async fn compact(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<CompactQuery>,
) -> ApiResult<Json<vestige_core::CompactionSummary>> {
    Ok(Json(
        state
            .engine
            .compact(user_id, query.remove_stale, query.merge_duplicates)
            .await?,
    ))
}

async fn retrieve_context(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<ContextRequest>,
) -> ApiResult<Json<vestige_core::memory::RetrievedContext>> {
    Ok(Json(state.engine.retrieve_context(user_id, request).await?))
}

async fn voice_context(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Response> {
    match state.engine.voice_context(user_id).await? {
        Some(ctx) => Ok(Json(ctx).into_response()),
        None => Ok((StatusCode::NOT_FOUND, Json(json!({"error": "no voice profile yet"})))
            .into_response()),
    }
}

#[derive(Debug, Deserialize)]
struct SuggestRelatedQuery {
    #[serde(default = "default_suggest_limit")]
    limit: usize,
}

fn default_suggest_limit() -> usize {
    5
}

async fn suggest_related(
    State(state): State<AppState>,
    Path((user_id, entry_id)): Path<(String, String)>,
    Query(query): Query<SuggestRelatedQuery>,
) -> ApiResult<Json<Vec<vestige_core::memory::MemoryEntry>>> {
    Ok(Json(
        state
            .engine
            .suggest_related(user_id, entry_id, query.limit)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct PreviewRequest {
    template: String,
    context: String,
    query: String,
}

/// Naive `{{context}}`/`{{query}}` substitution, matching the reference
/// system's `preview_context_injection` exactly (no templating engine).
async fn preview_context(Json(request): Json<PreviewRequest>) -> Json<serde_json::Value> {
    let rendered = request
        .template
        .replace("{{context}}", &request.context)
        .replace("{{query}}", &request.query);
    Json(json!({ "rendered": rendered }))
}
