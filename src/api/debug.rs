/*
 * Responsibility
 * - debug listener 用 handler (/debug/liveness, /debug/readiness, /debug/vars)
 * - API 側の middleware chain は通さない (素の axum handler)
 */
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;

use crate::{middleware::MetricsSnapshot, state::AppState};

const READINESS_TIMEOUT: Duration = Duration::from_secs(1);

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/debug/liveness", get(liveness))
        .route("/debug/readiness", get(readiness))
        .route("/debug/vars", get(vars))
        .with_state(state)
}

pub async fn liveness() -> impl IntoResponse {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "unavailable".to_string());

    (
        StatusCode::OK,
        Json(json!({
            "status": "up",
            "host": host,
            "pid": std::process::id(),
        })),
    )
}

pub async fn readiness(State(state): State<AppState>) -> Response {
    let status = match tokio::time::timeout(READINESS_TIMEOUT, state.users.check()).await {
        Ok(Ok(())) => return (StatusCode::OK, Json(json!({"status": "ok"}))).into_response(),
        Ok(Err(err)) => {
            tracing::warn!(error = ?err, "readiness: user store check failed");
            "user store not ready"
        }
        Err(_) => {
            tracing::warn!("readiness: user store check timed out");
            "user store check timed out"
        }
    };

    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"status": status}))).into_response()
}

pub async fn vars(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
