//! Backup store: encoded snapshots kept as files in one directory.
//!
//! Every name handed in from outside is checked before it reaches the
//! filesystem. A valid name is a single path component made of
//! `[A-Za-z0-9._-]`, not starting with a dot, ending in `.json` or `.zip`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use waymark_engine::ArchiveFormat;

/// Errors from the backup store.
#[derive(Debug, thiserror::Error)]
pub enum BackupStoreError {
    #[error("invalid backup name: {0}")]
    InvalidName(String),

    #[error("backup not found: {0}")]
    NotFound(String),

    #[error("backup already exists: {0}")]
    AlreadyExists(String),

    #[error("backup store IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BackupStoreError>;

/// A stored backup as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub name: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
    pub format: ArchiveFormat,
}

/// Directory of encoded snapshots.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    /// Open the store, creating its directory when missing.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Stored backups, most recently modified first.
    pub async fn list(&self) -> Result<Vec<BackupInfo>> {
        let mut backups = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Ok(format) = check_name(&name) else {
                continue;
            };
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            backups.push(BackupInfo {
                name,
                size_bytes: metadata.len(),
                modified_at: DateTime::<Utc>::from(metadata.modified()?),
                format,
            });
        }

        backups.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(backups)
    }

    /// Write a new backup and return its listing entry.
    ///
    /// `suggested_name` is sanitized and given the extension matching
    /// `format`; without one a timestamped name is generated. Existing files
    /// are never overwritten.
    pub async fn persist(
        &self,
        bytes: &[u8],
        format: ArchiveFormat,
        suggested_name: Option<&str>,
    ) -> Result<BackupInfo> {
        let name = backup_name(suggested_name, format, Utc::now());
        let path = self.resolve(&name)?.0;

        if fs::try_exists(&path).await? {
            return Err(BackupStoreError::AlreadyExists(name));
        }

        // Leading dot keeps a half-written file out of listings.
        let tmp = self.dir.join(format!(".{name}.tmp"));
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => BackupStoreError::AlreadyExists(name.clone()),
                _ => BackupStoreError::Io(e),
            })?;

        let written = async {
            file.write_all(bytes).await?;
            file.sync_all().await?;
            fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        let metadata = fs::metadata(&path).await?;
        tracing::info!(backup = %name, size = metadata.len(), "Persisted backup");

        Ok(BackupInfo {
            name,
            size_bytes: metadata.len(),
            modified_at: DateTime::<Utc>::from(metadata.modified()?),
            format,
        })
    }

    /// Read a stored backup.
    pub async fn read(&self, name: &str) -> Result<(ArchiveFormat, Vec<u8>)> {
        let (path, format) = self.resolve(name)?;
        let bytes = fs::read(&path).await.map_err(|e| not_found(e, name))?;
        Ok((format, bytes))
    }

    /// Delete a stored backup.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let (path, _) = self.resolve(name)?;
        fs::remove_file(&path).await.map_err(|e| not_found(e, name))?;
        tracing::info!(backup = %name, "Deleted backup");
        Ok(())
    }

    /// Map a backup name to its path inside the store.
    fn resolve(&self, name: &str) -> Result<(PathBuf, ArchiveFormat)> {
        let format = check_name(name)?;
        Ok((self.dir.join(name), format))
    }
}

fn not_found(e: std::io::Error, name: &str) -> BackupStoreError {
    match e.kind() {
        ErrorKind::NotFound => BackupStoreError::NotFound(name.to_string()),
        _ => BackupStoreError::Io(e),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Validate a backup name and return the format its extension names.
fn check_name(name: &str) -> Result<ArchiveFormat> {
    let invalid = || BackupStoreError::InvalidName(name.to_string());

    if name.is_empty() || name.starts_with('.') || name.contains("..") {
        return Err(invalid());
    }
    if !name.chars().all(is_name_char) {
        return Err(invalid());
    }

    let (stem, ext) = name.rsplit_once('.').ok_or_else(invalid)?;
    if stem.is_empty() {
        return Err(invalid());
    }
    ArchiveFormat::from_extension(ext).ok_or_else(invalid)
}

/// Build the file name for a new backup.
fn backup_name(suggested: Option<&str>, format: ArchiveFormat, now: DateTime<Utc>) -> String {
    let stem = suggested
        .map(|s| {
            let s = s.trim();
            let s = match s.rsplit_once('.') {
                Some((stem, ext)) if ArchiveFormat::from_extension(ext).is_some() => stem,
                _ => s,
            };
            let cleaned: String = s
                .chars()
                .map(|c| if is_name_char(c) { c } else { '_' })
                .collect();
            let mut cleaned = cleaned.trim_start_matches('.').to_string();
            while cleaned.contains("..") {
                cleaned = cleaned.replace("..", ".");
            }
            cleaned.trim_end_matches('.').to_string()
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("backup_{}", now.format("%Y-%m-%d_%H-%M-%S")));

    format!("{stem}.{}", format.extension())
}
