use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::ApiState;

/// Bearer-token gate for operator endpoints. The token is minted per
/// daemon process and surfaced to the dashboard; hook shims never need it.
pub async fn require_bearer_token(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or("");

    if provided != state.daemon.auth_token {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({
                "status": "error",
                "error": "invalid or missing bearer token"
            })),
        )
            .into_response();
    }

    next.run(request).await
}
