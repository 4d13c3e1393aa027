use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use oak_runtime::{DaemonConfig, DaemonState};
use oak_server::{ApiState, build_router};
use tempfile::TempDir;
use tower::ServiceExt;

// These tests drive the router directly; the embedding/summarizer
// endpoints point at an unused loopback port, so every model call fails
// fast and the daemon exercises its degraded paths.

fn test_state(temp_dir: &TempDir) -> ApiState {
    let mut config = DaemonConfig::default();
    config.embedding.base_url = "http://127.0.0.1:9".to_string();
    config.summarizer.base_url = "http://127.0.0.1:9".to_string();
    config.embedding.timeout_secs = 1;
    config.summarizer.timeout_secs = 1;

    let daemon = DaemonState::initialize(temp_dir.path(), &temp_dir.path().join(".oak"), config)
        .expect("daemon state");
    ApiState { daemon }
}

fn router_and_state(temp_dir: &TempDir) -> (Router, ApiState) {
    let state = test_state(temp_dir);
    (build_router(state.clone()), state)
}

async fn post_json(
    router: &Router,
    uri: &str,
    body: serde_json::Value,
    headers: &[(&str, &str)],
) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = router
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let temp_dir = TempDir::new().unwrap();
    let (router, _state) = router_and_state(&temp_dir);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_session_start_reports_project_and_index() {
    let temp_dir = TempDir::new().unwrap();
    let (router, _state) = router_and_state(&temp_dir);

    let (status, body) = post_json(
        &router,
        "/api/oak/ci/session-start",
        serde_json::json!({"agent": "claude", "session_id": "S1", "source": "startup"}),
        &[],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["project_root"].is_string());
    assert!(body["index"].is_array());
    // Degraded model providers still yield an injected header
    assert!(body["injected_context"].as_str().unwrap().contains("[oak]"));
}

#[tokio::test]
async fn test_malformed_hook_payload_is_still_ok() {
    let temp_dir = TempDir::new().unwrap();
    let (router, _state) = router_and_state(&temp_dir);

    let (status, body) = post_json(
        &router,
        "/api/oak/ci/post-tool-use",
        serde_json::json!({"agent": "claude"}),
        &[],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_devtools_require_bearer_and_confirmation() {
    let temp_dir = TempDir::new().unwrap();
    let (router, state) = router_and_state(&temp_dir);
    let bearer = format!("Bearer {}", state.daemon.auth_token);

    // No token at all
    let (status, _) = post_json(
        &router,
        "/api/devtools/rebuild-memories",
        serde_json::json!({}),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Token but no confirmation header
    let (status, body) = post_json(
        &router,
        "/api/devtools/rebuild-memories",
        serde_json::json!({}),
        &[("authorization", bearer.as_str())],
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);
    assert!(body["error"].as_str().unwrap().contains("x-oak-confirm"));

    // Token plus confirmation: rebuild of an empty store succeeds
    let (status, body) = post_json(
        &router,
        "/api/devtools/rebuild-memories",
        serde_json::json!({}),
        &[
            ("authorization", bearer.as_str()),
            ("x-oak-confirm", "yes"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["observations"], 0);
}

#[tokio::test]
async fn test_backup_rejects_paths_outside_project_root() {
    let temp_dir = TempDir::new().unwrap();
    let (router, state) = router_and_state(&temp_dir);
    let bearer = format!("Bearer {}", state.daemon.auth_token);

    let (status, body) = post_json(
        &router,
        "/api/backup/export",
        serde_json::json!({"path": "../escape.sql"}),
        &[("authorization", bearer.as_str())],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("project root"));
}

#[tokio::test]
async fn test_backup_export_then_restore() {
    let temp_dir = TempDir::new().unwrap();
    let (router, state) = router_and_state(&temp_dir);
    let bearer = format!("Bearer {}", state.daemon.auth_token);

    // Capture something first
    post_json(
        &router,
        "/api/oak/ci/session-start",
        serde_json::json!({"agent": "claude", "session_id": "S1", "source": "startup"}),
        &[],
    )
    .await;

    let (status, body) = post_json(
        &router,
        "/api/backup/export",
        serde_json::json!({"path": "backups/dump.sql"}),
        &[("authorization", bearer.as_str())],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["bytes"].as_u64().unwrap() > 0);

    let (status, _body) = post_json(
        &router,
        "/api/restore/import",
        serde_json::json!({"path": "backups/dump.sql"}),
        &[("authorization", bearer.as_str())],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let db = state.daemon.engine.db().lock().unwrap();
    assert!(db.get_session("S1").unwrap().is_some());
}

#[tokio::test]
async fn test_search_with_empty_query() {
    let temp_dir = TempDir::new().unwrap();
    let (router, _state) = router_and_state(&temp_dir);

    let (status, body) = post_json(
        &router,
        "/api/search",
        serde_json::json!({"query": "  "}),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "empty query");
}

#[tokio::test]
async fn test_remember_persists_even_when_embedder_is_down() {
    let temp_dir = TempDir::new().unwrap();
    let (router, state) = router_and_state(&temp_dir);
    let bearer = format!("Bearer {}", state.daemon.auth_token);

    let (status, body) = post_json(
        &router,
        "/api/remember",
        serde_json::json!({
            "text": "deploys must run the migration job first",
            "memory_type": "gotcha",
            "tags": ["deploy"]
        }),
        &[("authorization", bearer.as_str())],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let id = body["observation_id"].as_str().unwrap();
    // Durable half committed; the vector half waits for recovery
    assert_eq!(body["embedded"], false);

    let db = state.daemon.engine.db().lock().unwrap();
    let row = db.get_observation(id).unwrap().unwrap();
    assert!(!row.embedded);
    assert_eq!(db.observations_pending_embedding().unwrap().len(), 1);
}
