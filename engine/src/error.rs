//! Error types for the Waymark engine.

use crate::EntityKind;
use thiserror::Error;

/// All possible errors from the Waymark engine.
///
/// Every variant is raised before the target store is touched: a restore
/// caller can rely on a failed decode or validation leaving no trace.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("malformed snapshot document: {0}")]
    MalformedDocument(String),

    #[error("unsupported snapshot format version: {found} (supported: {supported})")]
    UnsupportedFormatVersion { found: String, supported: String },

    #[error("snapshot carries {0} records but does not list them in includedKinds")]
    UnlistedKind(EntityKind),

    #[error("invalid {kind} record at position {index}: {reason}")]
    InvalidRecord {
        kind: EntityKind,
        index: usize,
        reason: String,
    },

    // Archive errors
    #[error("unreadable archive: {0}")]
    UnreadableArchive(String),

    #[error("archive does not contain the snapshot document '{0}'")]
    MissingDocument(String),

    #[error("archive entry escapes the asset directory: {0}")]
    UnsafeEntryPath(String),

    #[error("archive entry '{name}' expands past the {limit} byte limit")]
    EntryTooLarge { name: String, limit: u64 },

    #[error("failed to write archive: {0}")]
    ArchiveWrite(String),
}

impl Error {
    /// Whether this error describes a malformed or unsupported document.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::MalformedDocument(_)
                | Error::UnsupportedFormatVersion { .. }
                | Error::UnlistedKind(_)
                | Error::InvalidRecord { .. }
        )
    }

    /// Whether this error comes from the container layer.
    pub fn is_archive(&self) -> bool {
        !self.is_validation()
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
