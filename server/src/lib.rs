//! Waymark Server - backup and restore service for a trip collection.
//!
//! Exports the SQLite entity store as snapshots (plain JSON or a zip bundling
//! point images), keeps them in a backup directory and restores them under a
//! caller-chosen policy, using the waymark-engine snapshot model.

pub mod assets;
pub mod backups;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod handlers;
pub mod restore;
pub mod routes;

use crate::backups::BackupStore;
use crate::config::Config;
use crate::db::Pool;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub config: Arc<Config>,
    pub backups: Arc<BackupStore>,
    /// Held for the whole of a restore, asset extraction included.
    pub restore_lock: Arc<Mutex<()>>,
}

impl AppState {
    /// Build state, opening the backup directory named in `config`.
    pub async fn new(pool: Pool, config: Config) -> Result<Self, backups::BackupStoreError> {
        let backups = BackupStore::open(&config.backup_dir).await?;
        Ok(Self {
            pool,
            config: Arc::new(config),
            backups: Arc::new(backups),
            restore_lock: Arc::new(Mutex::new(())),
        })
    }
}

/// Build the application router with its middleware.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .merge(routes::create_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
