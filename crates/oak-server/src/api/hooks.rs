use axum::Json;
use axum::extract::State;
use oak_engine::handle_hook;
use oak_hooks::HookKind;

use super::ApiState;

// Hook handlers share one shape: run the event through the pipeline and
// answer its envelope. Whatever the agent sent, the response is 200 ok;
// agents are never blocked by daemon errors. Event capture completes even
// if the client gave up: the pipeline mutation happens before the
// response is built, not streamed.

async fn dispatch(state: &ApiState, kind: HookKind, body: serde_json::Value) -> Json<serde_json::Value> {
    Json(handle_hook(&state.daemon.engine, kind, &body).await)
}

pub async fn session_start(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let mut response = handle_hook(&state.daemon.engine, HookKind::SessionStart, &body).await;
    // session-start additionally reports where the daemon lives and what
    // the index holds
    if let Some(map) = response.as_object_mut() {
        map.insert(
            "project_root".to_string(),
            serde_json::json!(state.daemon.project_root.display().to_string()),
        );
        map.insert(
            "index".to_string(),
            serde_json::json!(state.daemon.engine.vectors().status()),
        );
    }
    Json(response)
}

pub async fn prompt_submit(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    dispatch(&state, HookKind::PromptSubmit, body).await
}

pub async fn post_tool_use(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    dispatch(&state, HookKind::PostToolUse, body).await
}

pub async fn post_tool_use_failure(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    dispatch(&state, HookKind::PostToolUseFailure, body).await
}

pub async fn stop(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    dispatch(&state, HookKind::Stop, body).await
}

pub async fn session_end(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    dispatch(&state, HookKind::SessionEnd, body).await
}

pub async fn subagent_start(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    dispatch(&state, HookKind::SubagentStart, body).await
}

pub async fn subagent_stop(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    dispatch(&state, HookKind::SubagentStop, body).await
}

pub async fn pre_compact(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    dispatch(&state, HookKind::PreCompact, body).await
}

pub async fn notify(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    dispatch(&state, HookKind::Notify, body).await
}
