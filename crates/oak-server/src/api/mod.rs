mod auth;
mod backup;
mod devtools;
mod hooks;
mod search;
mod status;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use oak_runtime::DaemonState;
use tower_http::trace::TraceLayer;

/// Shared handler state; clones are cheap
#[derive(Clone)]
pub struct ApiState {
    pub daemon: Arc<DaemonState>,
}

pub fn build_router(state: ApiState) -> Router {
    // Operator-facing mutating routes sit behind the bearer token; hook
    // endpoints stay open because the shims only know the loopback port.
    let protected = Router::new()
        .route("/api/remember", post(search::remember))
        .route("/api/devtools/rebuild-index", post(devtools::rebuild_index))
        .route(
            "/api/devtools/rebuild-memories",
            post(devtools::rebuild_memories),
        )
        .route(
            "/api/devtools/reset-processing",
            post(devtools::reset_processing),
        )
        .route(
            "/api/devtools/trigger-processing",
            post(devtools::trigger_processing),
        )
        .route("/api/backup/export", post(backup::export))
        .route("/api/restore/import", post(backup::import))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    Router::new()
        .route("/api/oak/ci/session-start", post(hooks::session_start))
        .route("/api/oak/ci/prompt-submit", post(hooks::prompt_submit))
        .route("/api/oak/ci/post-tool-use", post(hooks::post_tool_use))
        .route(
            "/api/oak/ci/post-tool-use-failure",
            post(hooks::post_tool_use_failure),
        )
        .route("/api/oak/ci/stop", post(hooks::stop))
        .route("/api/oak/ci/session-end", post(hooks::session_end))
        .route("/api/oak/ci/subagent-start", post(hooks::subagent_start))
        .route("/api/oak/ci/subagent-stop", post(hooks::subagent_stop))
        .route("/api/oak/ci/pre-compact", post(hooks::pre_compact))
        .route("/api/oak/ci/notify", post(hooks::notify))
        .route("/api/health", get(status::health))
        .route("/api/status", get(status::status))
        .route("/api/search", post(search::search))
        .route("/api/fetch", post(search::fetch))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
