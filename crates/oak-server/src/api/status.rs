use axum::Json;
use axum::extract::State;
use chrono::Utc;

use super::ApiState;

pub async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "pid": std::process::id(),
        "uptime_secs": (Utc::now() - state.daemon.started_at).num_seconds(),
    }))
}

pub async fn status(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let store_stats = {
        let db = state.daemon.engine.db().lock().expect("db lock poisoned");
        db.stats().ok()
    };

    Json(serde_json::json!({
        "status": "ok",
        "project_root": state.daemon.project_root.display().to_string(),
        "data_dir": state.daemon.data_dir.display().to_string(),
        "port": state.daemon.port,
        "started_at": oak_types::format_ts(state.daemon.started_at),
        "store": store_stats,
        "collections": state.daemon.engine.vectors().status(),
    }))
}
