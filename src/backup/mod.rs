//! Encrypted backups: manual trigger, listing and download for admins,
//! plus the cron-driven scheduler.

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use log::error;
use std::sync::Arc;

use crate::audit::{record, AuditEntry};
use crate::core::shared::enums::Role;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::state::AppState;
use crate::security::auth_api::AuthenticatedUser;

#[cfg(feature = "automation")]
pub mod scheduler;
pub mod service;

#[cfg(feature = "automation")]
pub use scheduler::BackupScheduler;
pub use service::{cron_expression, BackupFile, BackupService};

pub fn configure_backup_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/admin/backup", post(trigger_backup))
        .route("/api/v1/admin/backups", get(list_backups))
        .route("/api/v1/admin/backups/:filename", get(download_backup))
}

pub async fn trigger_backup(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_role(Role::Admin)?;
    let service = Arc::clone(&state.backup);
    let filename = tokio::task::spawn_blocking(move || service.perform_backup())
        .await?
        .map_err(|e| {
            error!("Manual backup failed: {e:#}");
            ApiError::Internal("Backup Failed".to_string())
        })?;

    record(
        &state,
        AuditEntry::by(&user, "BACKUP", "Backup").with_resource_id(filename.clone()),
    )
    .await;
    Ok(Json(serde_json::json!({
        "message": "Backup created successfully",
        "filename": filename,
    })))
}

pub async fn list_backups(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> ApiResult<Json<Vec<BackupFile>>> {
    user.require_role(Role::Admin)?;
    let service = Arc::clone(&state.backup);
    let files = tokio::task::spawn_blocking(move || service.list_backups()).await??;
    Ok(Json(files))
}

pub async fn download_backup(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    user.require_role(Role::Admin)?;
    let service = Arc::clone(&state.backup);
    let requested = filename.clone();
    let path = tokio::task::spawn_blocking(move || service.backup_path(&requested)).await??;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("Cannot read backup {filename}: {e}")))?;

    Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from(bytes))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
