//! Backup, export and restore routes.

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use waymark_engine::ArchiveFormat;

use crate::backups::BackupInfo;
use crate::error::Result;
use crate::handlers::{
    create_snapshot, delete_snapshot, list_snapshots, persist_snapshot, read_snapshot,
    restore_snapshot, restore_stored_snapshot, CreateBackupRequest, CreatedBackup,
    ExportRequest, RestoreOutcome, RestoreQuery,
};
use crate::AppState;

/// Create backup routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/backups", get(list_handler).post(create_handler))
        .route("/backups/{name}", get(download_handler).delete(delete_handler))
        .route("/backups/{name}/restore", post(restore_stored_handler))
        .route("/export", post(export_handler))
        .route("/restore", post(restore_upload_handler))
}

/// Attach download headers to an encoded snapshot.
fn attachment(name: &str, format: ArchiveFormat, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// GET /backups - List stored backups, newest first.
async fn list_handler(State(state): State<AppState>) -> Result<Json<Vec<BackupInfo>>> {
    Ok(Json(list_snapshots(&state).await?))
}

/// POST /backups - Build a snapshot and store it.
async fn create_handler(
    State(state): State<AppState>,
    request: std::result::Result<Json<CreateBackupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedBackup>)> {
    let Json(request) = request?;
    let created = persist_snapshot(&state, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /backups/{name} - Download a stored backup.
async fn download_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response> {
    let (format, bytes) = read_snapshot(&state, &name).await?;
    Ok(attachment(&name, format, bytes))
}

/// DELETE /backups/{name} - Delete a stored backup.
async fn delete_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    delete_snapshot(&state, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /backups/{name}/restore?policy= - Restore a stored backup.
async fn restore_stored_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    query: std::result::Result<Query<RestoreQuery>, QueryRejection>,
) -> Result<Json<RestoreOutcome>> {
    let Query(query) = query?;
    let outcome = restore_stored_snapshot(&state, &name, query.policy).await?;
    Ok(Json(outcome))
}

/// POST /export - Build a snapshot and download it without storing.
async fn export_handler(
    State(state): State<AppState>,
    request: std::result::Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = request?;
    let exported = create_snapshot(&state, &request).await?;
    let format = exported.archive.format;
    let name = format!(
        "waymark_{}.{}",
        Utc::now().format("%Y-%m-%d_%H-%M-%S"),
        format.extension()
    );
    Ok(attachment(&name, format, exported.archive.bytes))
}

/// POST /restore?policy= - Restore an uploaded snapshot.
async fn restore_upload_handler(
    State(state): State<AppState>,
    query: std::result::Result<Query<RestoreQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Json<RestoreOutcome>> {
    let Query(query) = query?;
    let outcome = restore_snapshot(&state, &body, query.policy).await?;
    Ok(Json(outcome))
}
