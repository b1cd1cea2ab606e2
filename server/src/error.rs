//! Unified error handling for the server.

use crate::backups::BackupStoreError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] waymark_engine::Error),

    #[error("Backup store error: {0}")]
    Backup(#[from] BackupStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Engine(waymark_engine::Error::ArchiveWrite(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Engine(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Backup(BackupStoreError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            AppError::Backup(BackupStoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Backup(BackupStoreError::AlreadyExists(_)) => StatusCode::CONFLICT,
            AppError::Backup(BackupStoreError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_message, details) = match &self {
            AppError::Database(e) => {
                tracing::error!(error = ?e, "Database error");
                ("Database error".to_string(), None)
            }
            AppError::Io(e) => {
                tracing::error!(error = ?e, "IO error");
                ("Internal server error".to_string(), Some(e.to_string()))
            }
            AppError::Engine(e) if status.is_server_error() => {
                tracing::error!(error = ?e, "Engine error");
                ("Internal server error".to_string(), Some(e.to_string()))
            }
            AppError::Engine(e) => {
                tracing::warn!(error = ?e, "Rejected snapshot");
                (e.to_string(), None)
            }
            AppError::Backup(BackupStoreError::Io(e)) => {
                tracing::error!(error = ?e, "Backup store IO error");
                ("Internal server error".to_string(), Some(e.to_string()))
            }
            AppError::Backup(e) => (e.to_string(), None),
            AppError::BadRequest(msg) => (msg.clone(), None),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
