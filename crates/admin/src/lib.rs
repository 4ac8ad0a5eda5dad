pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use clickrush_game::GameService;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

pub use state::{AppState, SharedState};

/// Build the Axum router with all admin API routes and middleware.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Liveness
        .route("/api/health", get(routes::health::health_check))
        // Prometheus metrics
        .route("/api/metrics", get(routes::metrics::get_metrics))
        // Persisted documents
        .route("/api/stats", get(routes::stats::get_stats))
        .route("/api/achievements", get(routes::stats::get_achievements))
        // Backup management
        .route(
            "/api/backups",
            get(routes::backups::list_backups).post(routes::backups::create_backup),
        )
        .route("/api/backups/restore", post(routes::backups::restore_backup))
        .with_state(state)
        .layer(cors)
}

/// Start the admin API server on the specified address.
///
/// Runs until `shutdown` is cancelled.
pub async fn run_admin_server(
    state: SharedState,
    listen_addr: &str,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("admin API server listening on {}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("admin API server stopped");
    Ok(())
}

/// Convenience function to create a SharedState around a running service.
pub fn new_shared_state(service: Arc<GameService>) -> SharedState {
    Arc::new(AppState::new(service))
}
