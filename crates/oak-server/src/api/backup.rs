use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::path::Path;

use super::ApiState;

#[derive(Debug, Deserialize)]
pub struct BackupRequest {
    /// Destination (export) or source (restore), inside the project root
    pub path: String,
}

fn rejected(reason: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "status": "error", "error": reason })),
    )
        .into_response()
}

pub async fn export(
    State(state): State<ApiState>,
    Json(request): Json<BackupRequest>,
) -> Response {
    let target = Path::new(&request.path);
    if !state.daemon.contains_path(target) {
        return rejected("backup path escapes the project root");
    }

    let dump = {
        let db = state.daemon.engine.db().lock().expect("db lock poisoned");
        oak_store::export_dump(&db)
    };
    let dump = match dump {
        Ok(dump) => dump,
        Err(err) => return rejected(&err.to_string()),
    };

    let absolute = state.daemon.project_root.join(target);
    if let Some(parent) = absolute.parent() {
        if let Err(err) = std::fs::create_dir_all(parent) {
            return rejected(&err.to_string());
        }
    }
    match std::fs::write(&absolute, &dump) {
        Ok(()) => Json(serde_json::json!({
            "status": "ok",
            "path": absolute.display().to_string(),
            "bytes": dump.len(),
        }))
        .into_response(),
        Err(err) => rejected(&err.to_string()),
    }
}

pub async fn import(
    State(state): State<ApiState>,
    Json(request): Json<BackupRequest>,
) -> Response {
    let source = Path::new(&request.path);
    if !state.daemon.contains_path(source) {
        return rejected("restore path escapes the project root");
    }

    let absolute = state.daemon.project_root.join(source);
    let dump = match std::fs::read_to_string(&absolute) {
        Ok(dump) => dump,
        Err(err) => return rejected(&err.to_string()),
    };

    let result = {
        let mut db = state.daemon.engine.db().lock().expect("db lock poisoned");
        oak_store::restore_dump(&mut db, &dump)
    };
    match result {
        Ok(()) => Json(serde_json::json!({ "status": "ok" })).into_response(),
        Err(err) => rejected(&err.to_string()),
    }
}
