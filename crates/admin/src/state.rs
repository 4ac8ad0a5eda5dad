use std::sync::Arc;

use clickrush_game::GameService;

/// Shared state type alias used across all route handlers.
pub type SharedState = Arc<AppState>;

/// State handed to every admin route.
pub struct AppState {
    pub service: Arc<GameService>,
}

impl AppState {
    pub fn new(service: Arc<GameService>) -> Self {
        Self { service }
    }
}
