use axum::Json;
use axum::extract::State;
use oak_engine::SearchType;
use oak_store::NewObservation;
use oak_types::{MemoryType, SessionSource, SessionStatus};
use serde::Deserialize;

use super::ApiState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub search_type: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Retrieval surface for the MCP/CLI layer; no confidence floor so the
/// caller sees the full graded spread.
pub async fn search(
    State(state): State<ApiState>,
    Json(request): Json<SearchRequest>,
) -> Json<serde_json::Value> {
    let search_type = request
        .search_type
        .as_deref()
        .and_then(SearchType::parse)
        .unwrap_or(SearchType::All);

    if request.query.trim().is_empty() {
        return Json(serde_json::json!({
            "status": "ok",
            "detail": "empty query",
            "result": oak_engine::RetrievalResult::default(),
        }));
    }

    let result = state
        .daemon
        .engine
        .retrieve(
            &request.query,
            search_type,
            request.file_path.as_deref(),
            None,
        )
        .await;

    Json(serde_json::json!({ "status": "ok", "result": result }))
}

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    pub id: String,
}

pub async fn fetch(
    State(state): State<ApiState>,
    Json(request): Json<FetchRequest>,
) -> Json<serde_json::Value> {
    // Observations live in the relational store; code chunk ids only have
    // their vector metadata.
    let observation = {
        let db = state.daemon.engine.db().lock().expect("db lock poisoned");
        db.get_observation(&request.id).ok().flatten()
    };
    if let Some(observation) = observation {
        return Json(serde_json::json!({ "status": "ok", "observation": observation }));
    }

    match state
        .daemon
        .engine
        .vectors()
        .contains(oak_vector::CODE_COLLECTION, &request.id)
    {
        Ok(true) => Json(serde_json::json!({ "status": "ok", "id": request.id })),
        _ => Json(serde_json::json!({ "status": "ok", "detail": "not found" })),
    }
}

#[derive(Debug, Deserialize)]
pub struct RememberRequest {
    pub text: String,
    #[serde(default)]
    pub memory_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Manual observation ingestion: same redact → insert → embed → upsert
/// path as the processor.
pub async fn remember(
    State(state): State<ApiState>,
    Json(request): Json<RememberRequest>,
) -> Json<serde_json::Value> {
    if request.text.trim().is_empty() {
        return Json(serde_json::json!({ "status": "ok", "detail": "empty text" }));
    }

    let session_id = request.session_id.unwrap_or_else(|| "manual".to_string());
    // Manual observations hang off a synthetic operator session; the
    // observation insert is FK-constrained, so a failure here is a real
    // failure, not something to shrug past.
    let ensured = {
        let db = state.daemon.engine.db().lock().expect("db lock poisoned");
        db.get_session(&session_id).and_then(|existing| {
            if existing.is_some() {
                return Ok(());
            }
            let now = chrono::Utc::now();
            db.insert_session(&oak_store::SessionRecord {
                id: session_id.clone(),
                agent_label: "operator".to_string(),
                source: SessionSource::Startup,
                status: SessionStatus::Active,
                created_at: now,
                last_activity_at: now,
                ended_at: None,
                tool_count: 0,
                files_touched: 0,
                error_count: 0,
            })
        })
    };
    if let Err(err) = ensured {
        tracing::warn!(session_id = %session_id, error = %err, "remember could not create its session");
        return Json(serde_json::json!({ "status": "error", "error": err.to_string() }));
    }

    let memory_type = request
        .memory_type
        .as_deref()
        .and_then(MemoryType::parse)
        .unwrap_or(MemoryType::Discovery);

    match state
        .daemon
        .engine
        .persist_observation(NewObservation {
            session_id,
            batch_id: None,
            memory_type,
            observation_text: request.text,
            tags: request.tags,
            file_path: request.file_path,
            confidence: 1.0,
        })
        .await
    {
        Ok(observation) => Json(serde_json::json!({
            "status": "ok",
            "observation_id": observation.id,
            "embedded": observation.embedded,
        })),
        // Only the durable row insert can fail here (a down embedder just
        // leaves embedded=false), so the caller must see the failure
        Err(err) => {
            tracing::warn!(error = %err, "remember failed");
            Json(serde_json::json!({ "status": "error", "error": err.to_string() }))
        }
    }
}
