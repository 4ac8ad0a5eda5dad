use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::SharedState;

/// GET /api/stats
///
/// Returns the in-memory statistics document, or 404 when stats are disabled.
pub async fn get_stats(State(state): State<SharedState>) -> impl IntoResponse {
    match state.service.stats() {
        Some(stats) => (StatusCode::OK, Json(json!(stats))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Stats disabled" })),
        ),
    }
}

/// GET /api/achievements
pub async fn get_achievements(State(state): State<SharedState>) -> impl IntoResponse {
    match state.service.achievements() {
        Some(achievements) => (StatusCode::OK, Json(json!(achievements))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Achievements disabled" })),
        ),
    }
}
