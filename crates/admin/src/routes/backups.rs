use std::path::{Component, Path, PathBuf};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct RestoreRequest {
    /// Snapshot path relative to the backup directory.
    pub path: String,
}

/// GET /api/backups
///
/// Lists snapshot file names, newest first.
pub async fn list_backups(State(state): State<SharedState>) -> impl IntoResponse {
    let service = state.service.clone();
    let listed = tokio::task::spawn_blocking(move || service.list_backups()).await;

    match listed {
        Ok(Ok(paths)) => {
            let names: Vec<String> = paths.iter().filter_map(|p| file_name(p)).collect();
            (
                StatusCode::OK,
                Json(json!({ "total": names.len(), "backups": names })),
            )
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "failed to list backups");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
        Err(e) => internal_error(e),
    }
}

/// POST /api/backups
pub async fn create_backup(State(state): State<SharedState>) -> impl IntoResponse {
    if !state.service.backups_enabled() {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Backups disabled" })),
        );
    }

    let service = state.service.clone();
    match tokio::task::spawn_blocking(move || service.create_backup()).await {
        Ok(Some(path)) => {
            tracing::info!(path = %path.display(), "backup created via admin API");
            (
                StatusCode::CREATED,
                Json(json!({ "backup": file_name(&path) })),
            )
        }
        Ok(None) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Backup failed" })),
        ),
        Err(e) => internal_error(e),
    }
}

/// POST /api/backups/restore
///
/// Restores the named snapshot and reloads the live documents.
pub async fn restore_backup(
    State(state): State<SharedState>,
    Json(req): Json<RestoreRequest>,
) -> impl IntoResponse {
    let Some(path) = resolve_in(state.service.backup_dir(), &req.path) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "path must name a file inside the backup directory" })),
        );
    };

    if !path.is_file() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("backup '{}' not found", req.path) })),
        );
    }

    let service = state.service.clone();
    let target = path.clone();
    match tokio::task::spawn_blocking(move || service.restore_backup(&target)).await {
        Ok(true) => {
            tracing::warn!(path = %path.display(), "backup restored via admin API");
            (StatusCode::OK, Json(json!({ "restored": req.path })))
        }
        Ok(false) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": format!("backup '{}' could not be restored", req.path) })),
        ),
        Err(e) => internal_error(e),
    }
}

/// Join `relative` onto `base`, refusing anything that could leave `base`.
fn resolve_in(base: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative.as_os_str().is_empty() {
        return None;
    }
    let confined = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    confined.then(|| base.join(relative))
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn internal_error(e: tokio::task::JoinError) -> (StatusCode, Json<serde_json::Value>) {
    tracing::error!(error = %e, "backup task failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "backup task failed" })),
    )
}
