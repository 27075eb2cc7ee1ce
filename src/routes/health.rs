use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/database", get(database_health))
        .route("/stats", get(stats))
}

pub async fn health_check(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "uptimeSecs": state.uptime_secs(),
        "store": {
            "healthy": probe_store(&state),
        }
    }))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if probe_store(&state) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

fn probe_store(state: &AppState) -> bool {
    state.store().get_user_progress("__health_check__").is_ok()
}

pub async fn database_health(
    State(state): State<AppState>,
) -> impl axum::response::IntoResponse {
    let start = Instant::now();
    let healthy = probe_store(&state);
    let latency_us = start.elapsed().as_micros() as u64;

    Json(serde_json::json!({
        "healthy": healthy,
        "latencyUs": latency_us,
        "consecutiveFailures": if healthy { 0 } else { 1 },
    }))
}

pub async fn stats(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let learning = state.engine().config();
    Json(serde_json::json!({
        "liveSessions": state.engine().live_session_count().await,
        "cachedArtifacts": state.store().artifact_cache_len(),
        "masteryThreshold": learning.mastery_threshold,
        "generationVersion": state.config().generation.config_version,
    }))
}
