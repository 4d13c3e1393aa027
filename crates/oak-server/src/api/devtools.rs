use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use oak_engine::CodeChunk;
use serde::Deserialize;

use super::ApiState;

/// Devtools rewrite history or whole collections; a deliberate header is
/// required on top of the bearer token.
fn confirmed(headers: &HeaderMap) -> bool {
    headers
        .get("x-oak-confirm")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("yes"))
}

fn needs_confirmation() -> Response {
    (
        StatusCode::PRECONDITION_REQUIRED,
        Json(serde_json::json!({
            "status": "error",
            "error": "destructive operation requires header 'x-oak-confirm: yes'"
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct RebuildIndexRequest {
    #[serde(default)]
    pub chunks: Vec<CodeChunk>,
}

pub async fn rebuild_index(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<RebuildIndexRequest>,
) -> Response {
    if !confirmed(&headers) {
        return needs_confirmation();
    }
    match state.daemon.engine.rebuild_code_index(&request.chunks).await {
        Ok(count) => Json(serde_json::json!({ "status": "ok", "chunks": count })).into_response(),
        Err(err) => operation_failed(err),
    }
}

pub async fn rebuild_memories(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    if !confirmed(&headers) {
        return needs_confirmation();
    }
    match state.daemon.engine.rebuild_memories().await {
        Ok(count) => {
            Json(serde_json::json!({ "status": "ok", "observations": count })).into_response()
        }
        Err(err) => operation_failed(err),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ResetProcessingRequest {
    #[serde(default)]
    pub delete_observations: bool,
}

pub async fn reset_processing(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<ResetProcessingRequest>,
) -> Response {
    if !confirmed(&headers) {
        return needs_confirmation();
    }
    let result = {
        let mut db = state.daemon.engine.db().lock().expect("db lock poisoned");
        db.reset_processing(request.delete_observations)
    };
    match result {
        Ok(()) => {
            state.daemon.engine.notify_work();
            Json(serde_json::json!({ "status": "ok" })).into_response()
        }
        Err(err) => operation_failed(err),
    }
}

pub async fn trigger_processing(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    if !confirmed(&headers) {
        return needs_confirmation();
    }
    match state.daemon.engine.process_pending().await {
        Ok(count) => Json(serde_json::json!({ "status": "ok", "processed": count })).into_response(),
        Err(err) => operation_failed(err),
    }
}

fn operation_failed(err: impl std::fmt::Display) -> Response {
    (
        StatusCode::CONFLICT,
        Json(serde_json::json!({ "status": "error", "error": err.to_string() })),
    )
        .into_response()
}
