//! Restoring uploaded or stored snapshots.

use crate::assets;
use crate::error::Result;
use crate::restore;
use crate::AppState;
use serde::{Deserialize, Serialize};
use waymark_engine::{archive, ArchiveFormat, RestorePolicy, RestoreReport};

/// Query parameters naming the restore policy. There is no default.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RestoreQuery {
    pub policy: RestorePolicy,
}

/// Response for a completed restore.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub policy: RestorePolicy,
    pub format: ArchiveFormat,
    pub report: RestoreReport,
    pub assets_written: usize,
}

/// Decode `bytes` and restore them under `policy`.
///
/// Decoding and validation finish before the store or the asset tree is
/// touched. Restores run one at a time.
pub async fn restore_snapshot(
    state: &AppState,
    bytes: &[u8],
    policy: RestorePolicy,
) -> Result<RestoreOutcome> {
    let decoded = archive::decode(bytes)?;
    tracing::info!(
        %policy,
        format = ?decoded.format,
        records = decoded.snapshot.record_count(),
        assets = decoded.assets.len(),
        "Restoring snapshot"
    );

    let _guard = state.restore_lock.lock().await;

    let assets_written = assets::extract(&state.config.upload_root, &decoded.assets).await?;
    let report = restore::restore(&state.pool, &decoded.snapshot, policy).await?;

    Ok(RestoreOutcome {
        policy,
        format: decoded.format,
        report,
        assets_written,
    })
}

/// Restore a backup from the backup store.
pub async fn restore_stored_snapshot(
    state: &AppState,
    name: &str,
    policy: RestorePolicy,
) -> Result<RestoreOutcome> {
    let (_, bytes) = state.backups.read(name).await?;
    restore_snapshot(state, &bytes, policy).await
}
