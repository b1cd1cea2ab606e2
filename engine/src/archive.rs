//! Archive codec: the on-disk and over-the-wire form of a snapshot.
//!
//! Two containers exist:
//!
//! - **Plain**: the snapshot document as pretty-printed JSON.
//! - **Bundled**: a zip holding the document under [`DOCUMENT_ENTRY`] plus
//!   point images and their thumbnails under [`ASSET_PREFIX`].
//!
//! The codec does no filesystem IO. Decoding hands back the asset entries
//! after checking every path stays under [`ASSET_PREFIX`]; writing them is
//! the caller's job.

use crate::{error::Result, Error, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Name of the snapshot document inside a bundled container.
pub const DOCUMENT_ENTRY: &str = "backup.json";

/// Every asset entry lives under this prefix.
pub const ASSET_PREFIX: &str = "uploads/points/";

/// Derived thumbnails live under this prefix.
pub const THUMBNAIL_PREFIX: &str = "uploads/points/thumbs/";

/// Bounds on how much a bundled container may expand to when decoded.
///
/// The declared size of a zip entry is not trusted: reads stop one byte
/// past the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Largest single entry, document included.
    pub max_entry_bytes: u64,
    /// Largest sum of all entries.
    pub max_total_bytes: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_entry_bytes: 64 * 1024 * 1024,
            max_total_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// Container form of an encoded snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    Json,
    Zip,
}

impl ArchiveFormat {
    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Json => "json",
            ArchiveFormat::Zip => "zip",
        }
    }

    /// MIME type for downloads.
    pub fn content_type(&self) -> &'static str {
        match self {
            ArchiveFormat::Json => "application/json",
            ArchiveFormat::Zip => "application/zip",
        }
    }

    /// Format for a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("json") {
            Some(ArchiveFormat::Json)
        } else if ext.eq_ignore_ascii_case("zip") {
            Some(ArchiveFormat::Zip)
        } else {
            None
        }
    }

    /// Sniff the container form from its leading bytes.
    pub fn detect(bytes: &[u8]) -> Self {
        // Local file header, or end-of-central-directory for an empty zip.
        if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
            ArchiveFormat::Zip
        } else {
            ArchiveFormat::Json
        }
    }
}

/// A binary file bundled alongside the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Path relative to the installation root, e.g. `uploads/points/a.jpg`
    pub path: String,
    pub bytes: Vec<u8>,
}

impl Asset {
    pub fn new(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }
}

/// Output of [`encode`].
#[derive(Debug, Clone)]
pub struct EncodedArchive {
    pub format: ArchiveFormat,
    pub bytes: Vec<u8>,
}

/// Output of [`decode`].
#[derive(Debug, Clone)]
pub struct DecodedArchive {
    pub format: ArchiveFormat,
    pub snapshot: Snapshot,
    /// Asset entries, already confined to [`ASSET_PREFIX`]
    pub assets: Vec<Asset>,
}

/// Check that `name` is a relative path under [`ASSET_PREFIX`] and return it
/// normalized.
pub fn asset_path(name: &str) -> Result<PathBuf> {
    let unsafe_path = || Error::UnsafeEntryPath(name.to_string());

    if name.contains('\\') || name.contains('\0') || !name.starts_with(ASSET_PREFIX) {
        return Err(unsafe_path());
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path());
            }
        }
    }

    if !normalized.starts_with(ASSET_PREFIX) || normalized.as_path() == Path::new(ASSET_PREFIX)
    {
        return Err(unsafe_path());
    }

    Ok(normalized)
}

/// Thumbnail path derived from a point's `image_path`.
///
/// Returns `None` for paths outside [`ASSET_PREFIX`] or already pointing at a
/// thumbnail.
pub fn thumbnail_path(image_path: &str) -> Option<String> {
    if !image_path.starts_with(ASSET_PREFIX) || image_path.starts_with(THUMBNAIL_PREFIX) {
        return None;
    }
    let file_name = image_path.rsplit('/').next().filter(|n| !n.is_empty())?;
    Some(format!("{THUMBNAIL_PREFIX}{file_name}"))
}

/// Encode a snapshot, bundling `assets` when there are any.
pub fn encode(snapshot: &Snapshot, assets: &[Asset]) -> Result<EncodedArchive> {
    let document = snapshot.to_json_pretty()?;

    if assets.is_empty() {
        return Ok(EncodedArchive {
            format: ArchiveFormat::Json,
            bytes: document.into_bytes(),
        });
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(
            DOCUMENT_ENTRY,
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        )
        .map_err(|e| Error::ArchiveWrite(e.to_string()))?;
    writer
        .write_all(document.as_bytes())
        .map_err(|e| Error::ArchiveWrite(e.to_string()))?;

    // Images are already compressed.
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut written = BTreeSet::new();
    for asset in assets {
        asset_path(&asset.path)?;
        if !written.insert(asset.path.as_str()) {
            continue;
        }
        writer
            .start_file(asset.path.as_str(), stored)
            .map_err(|e| Error::ArchiveWrite(e.to_string()))?;
        writer
            .write_all(&asset.bytes)
            .map_err(|e| Error::ArchiveWrite(e.to_string()))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| Error::ArchiveWrite(e.to_string()))?;

    Ok(EncodedArchive {
        format: ArchiveFormat::Zip,
        bytes: cursor.into_inner(),
    })
}

/// Decode either container form and validate the document.
pub fn decode(bytes: &[u8]) -> Result<DecodedArchive> {
    decode_with_limits(bytes, DecodeLimits::default())
}

/// [`decode`] with explicit expansion limits for bundled containers.
pub fn decode_with_limits(bytes: &[u8], limits: DecodeLimits) -> Result<DecodedArchive> {
    match ArchiveFormat::detect(bytes) {
        ArchiveFormat::Json => Ok(DecodedArchive {
            format: ArchiveFormat::Json,
            snapshot: Snapshot::from_slice(bytes)?,
            assets: Vec::new(),
        }),
        ArchiveFormat::Zip => decode_bundle(bytes, limits),
    }
}

/// Read one entry, failing once it passes `limit` bytes.
fn read_bounded(entry: &mut impl Read, name: &str, limit: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    entry
        .take(limit.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|e| Error::UnreadableArchive(e.to_string()))?;

    if buf.len() as u64 > limit {
        return Err(Error::EntryTooLarge {
            name: name.to_string(),
            limit,
        });
    }
    Ok(buf)
}

fn decode_bundle(bytes: &[u8], limits: DecodeLimits) -> Result<DecodedArchive> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::UnreadableArchive(e.to_string()))?;

    let mut document = None;
    let mut assets = Vec::new();
    let mut remaining = limits.max_total_bytes;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| Error::UnreadableArchive(e.to_string()))?;
        let name = entry.name().to_string();

        if entry.is_dir() {
            continue;
        }

        let is_document = name == DOCUMENT_ENTRY;
        let path = if is_document {
            None
        } else {
            let path = asset_path(&name)?;
            if entry.enclosed_name().is_none() {
                return Err(Error::UnsafeEntryPath(name));
            }
            Some(path)
        };

        let limit = limits.max_entry_bytes.min(remaining);
        if entry.size() > limit {
            return Err(Error::EntryTooLarge { name, limit });
        }
        let buf = read_bounded(&mut entry, &name, limit)?;
        remaining -= buf.len() as u64;

        match path {
            Some(path) => assets.push(Asset::new(path.to_string_lossy(), buf)),
            None => document = Some(buf),
        }
    }

    let document = document.ok_or_else(|| Error::MissingDocument(DOCUMENT_ENTRY.to_string()))?;
    let snapshot = Snapshot::from_slice(&document)?;

    Ok(DecodedArchive {
        format: ArchiveFormat::Zip,
        snapshot,
        assets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityKind, EntityRecord, Point, Record};

    fn snapshot_with_image(image: &str) -> Snapshot {
        let mut snapshot = Snapshot::new([EntityKind::Point], "waymark test");
        snapshot.entities.push(EntityRecord::Point(Record::new(
            Some(1),
            Point {
                trip_id: 1,
                title: "Ueno".into(),
                description: None,
                point_type: None,
                icon: None,
                image_path: Some(image.into()),
                latitude: 35.71,
                longitude: 139.77,
                visit_date: None,
            },
        )));
        snapshot
    }

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn format_detection() {
        assert_eq!(ArchiveFormat::detect(b"{\"formatVersion\""), ArchiveFormat::Json);
        assert_eq!(ArchiveFormat::detect(b"PK\x03\x04rest"), ArchiveFormat::Zip);
        assert_eq!(ArchiveFormat::from_extension("ZIP"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_extension("tar"), None);
    }

    #[test]
    fn plain_document_without_assets() {
        let snapshot = snapshot_with_image("uploads/points/a.jpg");
        let encoded = encode(&snapshot, &[]).unwrap();

        assert_eq!(encoded.format, ArchiveFormat::Json);
        assert!(encoded.bytes.starts_with(b"{"));

        let decoded = decode(&encoded.bytes).unwrap();
        assert_eq!(decoded.format, ArchiveFormat::Json);
        assert_eq!(decoded.snapshot, snapshot);
        assert!(decoded.assets.is_empty());
    }

    #[test]
    fn bundle_carries_document_and_assets() {
        let snapshot = snapshot_with_image("uploads/points/a.jpg");
        let assets = vec![
            Asset::new("uploads/points/a.jpg", vec![1, 2, 3]),
            Asset::new("uploads/points/thumbs/a.jpg", vec![4]),
        ];

        let encoded = encode(&snapshot, &assets).unwrap();
        assert_eq!(encoded.format, ArchiveFormat::Zip);

        let decoded = decode(&encoded.bytes).unwrap();
        assert_eq!(decoded.format, ArchiveFormat::Zip);
        assert_eq!(decoded.snapshot, snapshot);
        assert_eq!(decoded.assets, assets);
    }

    #[test]
    fn duplicate_assets_are_written_once() {
        let snapshot = snapshot_with_image("uploads/points/a.jpg");
        let assets = vec![
            Asset::new("uploads/points/a.jpg", vec![1]),
            Asset::new("uploads/points/a.jpg", vec![1]),
        ];

        let decoded = decode(&encode(&snapshot, &assets).unwrap().bytes).unwrap();
        assert_eq!(decoded.assets.len(), 1);
    }

    #[test]
    fn bundle_without_document_fails() {
        let bytes = zip_with(&[("uploads/points/a.jpg", b"img")]);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            Error::MissingDocument(DOCUMENT_ENTRY.to_string())
        );
    }

    #[test]
    fn bundle_with_traversal_entry_fails() {
        let document = snapshot_with_image("uploads/points/a.jpg").to_json().unwrap();
        let bytes = zip_with(&[
            (DOCUMENT_ENTRY, document.as_bytes()),
            ("uploads/points/../../config.php", b"<?php"),
        ]);

        assert!(matches!(
            decode(&bytes),
            Err(Error::UnsafeEntryPath(name)) if name.contains("config.php")
        ));
    }

    #[test]
    fn bundle_with_foreign_prefix_fails() {
        let document = snapshot_with_image("uploads/points/a.jpg").to_json().unwrap();
        let bytes = zip_with(&[
            (DOCUMENT_ENTRY, document.as_bytes()),
            ("index.php", b"<?php"),
        ]);

        assert!(matches!(decode(&bytes), Err(Error::UnsafeEntryPath(_))));
    }

    #[test]
    fn oversized_entry_is_rejected() {
        let document = snapshot_with_image("uploads/points/a.jpg").to_json().unwrap();
        let bytes = zip_with(&[
            (DOCUMENT_ENTRY, document.as_bytes()),
            ("uploads/points/a.jpg", &[0u8; 8192]),
        ]);
        let limits = DecodeLimits {
            max_entry_bytes: 4096,
            ..DecodeLimits::default()
        };

        let err = decode_with_limits(&bytes, limits).unwrap_err();
        let Error::EntryTooLarge { name, limit } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(name, "uploads/points/a.jpg");
        assert_eq!(*limit, 4096);
        assert!(err.is_archive());
    }

    #[test]
    fn total_expansion_is_bounded() {
        let document = snapshot_with_image("uploads/points/a.jpg").to_json().unwrap();
        let bytes = zip_with(&[
            (DOCUMENT_ENTRY, document.as_bytes()),
            ("uploads/points/a.jpg", &[1u8; 600]),
            ("uploads/points/b.jpg", &[2u8; 600]),
        ]);
        let limits = DecodeLimits {
            max_entry_bytes: 4096,
            max_total_bytes: document.len() as u64 + 1000,
        };

        let err = decode_with_limits(&bytes, limits).unwrap_err();
        assert!(matches!(err, Error::EntryTooLarge { .. }), "{err:?}");

        let roomy = DecodeLimits {
            max_total_bytes: document.len() as u64 + 1200,
            ..limits
        };
        assert_eq!(decode_with_limits(&bytes, roomy).unwrap().assets.len(), 2);
    }

    #[test]
    fn bounded_read_ignores_declared_size() {
        let mut reader = Cursor::new(vec![7u8; 10]);
        let err = read_bounded(&mut reader, "x", 9).unwrap_err();
        assert!(matches!(err, Error::EntryTooLarge { limit: 9, .. }));

        let mut reader = Cursor::new(vec![7u8; 10]);
        assert_eq!(read_bounded(&mut reader, "x", 10).unwrap().len(), 10);
    }

    #[test]
    fn garbage_zip_is_unreadable() {
        let result = decode(b"PK\x03\x04 definitely not a zip");
        assert!(matches!(result, Err(Error::UnreadableArchive(_))));
    }

    #[test]
    fn garbage_json_is_malformed() {
        let result = decode(b"not json at all");
        assert!(matches!(result, Err(Error::MalformedDocument(_))));
    }

    #[test]
    fn asset_path_rules() {
        assert_eq!(
            asset_path("uploads/points/a.jpg").unwrap(),
            PathBuf::from("uploads/points/a.jpg")
        );
        assert_eq!(
            asset_path("uploads/points/./thumbs/a.jpg").unwrap(),
            PathBuf::from("uploads/points/thumbs/a.jpg")
        );
        assert!(asset_path("uploads/points/").is_err());
        assert!(asset_path("uploads/pointsX/a.jpg").is_err());
        assert!(asset_path("/uploads/points/a.jpg").is_err());
        assert!(asset_path("uploads/points/..\\..\\a.jpg").is_err());
        assert!(asset_path("uploads/points/thumbs/../../../etc/passwd").is_err());
    }

    #[test]
    fn thumbnail_derivation() {
        assert_eq!(
            thumbnail_path("uploads/points/abc.jpg").as_deref(),
            Some("uploads/points/thumbs/abc.jpg")
        );
        assert_eq!(thumbnail_path("uploads/points/thumbs/abc.jpg"), None);
        assert_eq!(thumbnail_path("https://example.com/a.jpg"), None);
        assert_eq!(thumbnail_path("uploads/points/"), None);
    }
}
