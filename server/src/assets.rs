//! Asset tree IO: point images under the installation root.
//!
//! Export reads the files referenced by point `image_path` values (and their
//! thumbnails) into memory for bundling. Restore writes decoded bundle
//! entries back. Both sides go through [`archive::asset_path`], so nothing
//! outside `uploads/points/` is ever read or written.

use crate::error::Result;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use waymark_engine::archive::{self, Asset};
use waymark_engine::Snapshot;

/// Read every asset referenced by the snapshot's points.
///
/// Images outside the asset tree (remote URLs, foreign paths) are not
/// bundled. Missing files are logged and skipped.
pub async fn collect(root: &Path, snapshot: &Snapshot) -> Result<Vec<Asset>> {
    let mut wanted = BTreeSet::new();
    for record in snapshot.entities.points() {
        let Some(image) = record.fields.image_path.as_deref() else {
            continue;
        };
        if archive::asset_path(image).is_err() {
            tracing::debug!(image, "Image outside the asset tree, not bundled");
            continue;
        }
        wanted.insert(image.to_string());
        if let Some(thumb) = archive::thumbnail_path(image) {
            wanted.insert(thumb);
        }
    }

    let mut assets = Vec::with_capacity(wanted.len());
    for path in wanted {
        let relative = archive::asset_path(&path)?;
        match fs::read(root.join(&relative)).await {
            Ok(bytes) => assets.push(Asset::new(path, bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(asset = %path, "Referenced asset missing on disk, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::debug!(count = assets.len(), "Collected assets");
    Ok(assets)
}

/// Write decoded assets below `root`, creating directories as needed.
///
/// Returns the number of files written. Files are not part of the database
/// transaction and stay on disk if the restore later fails.
pub async fn extract(root: &Path, assets: &[Asset]) -> Result<usize> {
    for asset in assets {
        let relative = archive::asset_path(&asset.path)?;
        let target = root.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &asset.bytes).await?;
    }

    if !assets.is_empty() {
        tracing::info!(count = assets.len(), root = %root.display(), "Extracted assets");
    }
    Ok(assets.len())
}
