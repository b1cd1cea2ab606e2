//! Configuration management for the server.

use std::env;
use std::path::PathBuf;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// SQLite connection URL
    pub database_url: String,
    /// Directory holding persisted backups
    pub backup_dir: PathBuf,
    /// Installation root that `uploads/points/...` paths are relative to
    pub upload_root: PathBuf,
    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: "sqlite://waymark.db".to_string(),
            backup_dir: PathBuf::from("backups"),
            upload_root: PathBuf::from("."),
            max_upload_bytes: 256 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = env::var("HOST").unwrap_or(defaults.host);

        let port = match env::var("PORT") {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidPort(value))?,
            Err(_) => defaults.port,
        };

        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);

        let backup_dir = env::var("BACKUP_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.backup_dir);

        let upload_root = env::var("UPLOAD_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.upload_root);

        let max_upload_bytes = match env::var("MAX_UPLOAD_MB") {
            Ok(value) => parse_megabytes(&value).ok_or(ConfigError::InvalidUploadLimit(value))?,
            Err(_) => defaults.max_upload_bytes,
        };

        Ok(Self {
            host,
            port,
            database_url,
            backup_dir,
            upload_root,
            max_upload_bytes,
        })
    }
}

fn parse_megabytes(value: &str) -> Option<usize> {
    let mb: usize = value.trim().parse().ok()?;
    if mb == 0 {
        return None;
    }
    mb.checked_mul(1024 * 1024)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value: {0}")]
    InvalidPort(String),

    #[error("Invalid MAX_UPLOAD_MB value: {0}")]
    InvalidUploadLimit(String),
}
