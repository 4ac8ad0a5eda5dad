use axum::extract::State;
use axum::Json;
use clickrush_game::Health;

use crate::state::SharedState;

/// GET /api/health
///
/// Returns service status, uptime, live connections and the current count.
pub async fn health_check(State(state): State<SharedState>) -> Json<Health> {
    Json(state.service.health())
}
