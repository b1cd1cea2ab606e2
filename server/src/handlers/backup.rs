//! Snapshot creation and backup management.

use crate::assets;
use crate::backups::BackupInfo;
use crate::error::{AppError, Result};
use crate::export;
use crate::AppState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use waymark_engine::{archive, ArchiveFormat, EncodedArchive, EntityKind, SnapshotSummary};

fn all_kinds() -> BTreeSet<EntityKind> {
    EntityKind::ALL.into_iter().collect()
}

/// What to put in a snapshot.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    /// Kinds to export (all when omitted)
    #[serde(default = "all_kinds")]
    pub kinds: BTreeSet<EntityKind>,
    /// Bundle point images into a zip
    #[serde(default)]
    pub include_assets: bool,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            kinds: all_kinds(),
            include_assets: false,
        }
    }
}

/// Request body for persisting a new backup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBackupRequest {
    #[serde(flatten)]
    pub export: ExportRequest,
    /// File name to use; sanitized, extension set from the format
    #[serde(default)]
    pub name: Option<String>,
}

/// Response for a persisted backup.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBackup {
    pub backup: BackupInfo,
    pub summary: SnapshotSummary,
    pub assets: usize,
}

/// An encoded snapshot plus what went into it.
#[derive(Debug)]
pub struct ExportedSnapshot {
    pub archive: EncodedArchive,
    pub summary: SnapshotSummary,
    pub assets: usize,
}

/// Build and encode a snapshot of the requested kinds.
///
/// Produces a zip only when assets were requested and at least one
/// referenced file exists.
pub async fn create_snapshot(
    state: &AppState,
    request: &ExportRequest,
) -> Result<ExportedSnapshot> {
    if request.kinds.is_empty() {
        return Err(AppError::BadRequest(
            "at least one entity kind must be exported".to_string(),
        ));
    }

    let snapshot = export::build_snapshot(&state.pool, &request.kinds).await?;
    let assets = if request.include_assets {
        assets::collect(&state.config.upload_root, &snapshot).await?
    } else {
        Vec::new()
    };

    let archive = archive::encode(&snapshot, &assets)?;

    Ok(ExportedSnapshot {
        archive,
        summary: SnapshotSummary::from(&snapshot),
        assets: assets.len(),
    })
}

/// Build a snapshot and keep it in the backup store.
pub async fn persist_snapshot(
    state: &AppState,
    request: CreateBackupRequest,
) -> Result<CreatedBackup> {
    let exported = create_snapshot(state, &request.export).await?;
    let backup = state
        .backups
        .persist(
            &exported.archive.bytes,
            exported.archive.format,
            request.name.as_deref(),
        )
        .await?;

    Ok(CreatedBackup {
        backup,
        summary: exported.summary,
        assets: exported.assets,
    })
}

/// Stored backups, newest first.
pub async fn list_snapshots(state: &AppState) -> Result<Vec<BackupInfo>> {
    Ok(state.backups.list().await?)
}

/// Raw bytes of a stored backup.
pub async fn read_snapshot(state: &AppState, name: &str) -> Result<(ArchiveFormat, Vec<u8>)> {
    Ok(state.backups.read(name).await?)
}

pub async fn delete_snapshot(state: &AppState, name: &str) -> Result<()> {
    Ok(state.backups.delete(name).await?)
}
