//! Store error handling
//!
//! Provides typed errors for record store and library operations with
//! descriptive messages and recovery suggestions.
//!
//! A missing key is not an error: lookups return `Option`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing a store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to create the records or files directory
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to list a directory
    #[error("Failed to read directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error(
        "Disk full or quota exceeded while writing to '{path}'. Free up disk space and try again."
    )]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to read file
    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write file
    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to delete a file
    #[error("Failed to remove '{path}': {source}")]
    RemoveError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Record content cannot be parsed
    #[error("Malformed record '{path}': {details}")]
    Malformed { path: PathBuf, details: String },

    /// Two record files carry the same key
    #[error("Duplicate key '{id}' in '{path}' (already used by '{existing}')")]
    DuplicateId {
        id: String,
        path: PathBuf,
        existing: PathBuf,
    },

    /// A rename would overwrite a different file
    #[error("Cannot move '{from}' to '{to}': target already exists")]
    TargetOccupied { from: PathBuf, to: PathBuf },

    /// No record with this key exists
    #[error("No record with key '{id}'")]
    UnknownRecord { id: String },

    /// The file to attach does not exist
    #[error("Source file not found: '{path}'")]
    SourceNotFound { path: PathBuf },

    /// File not found (when expected to exist)
    #[error("File not found: '{path}'")]
    NotFound { path: PathBuf },

    /// Atomic write failed during rename
    #[error("Atomic write failed: could not rename '{from}' to '{to}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON serialization failed
    #[error("Failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StoreError::PermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::NotFound => StoreError::NotFound { path },
            _ if is_disk_full_error(&error) => StoreError::DiskFull {
                path,
                source: error,
            },
            _ => StoreError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// Whether this error breaks the one-file-per-key invariant
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateId { .. } | StoreError::TargetOccupied { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::DiskFull { .. } => Some("Free up disk space and try again."),
            StoreError::PermissionDenied { .. } => {
                Some("Check file and directory permissions of the library directory.")
            }
            StoreError::Malformed { .. } => {
                Some("Fix the JSON in the record file; it is skipped until then.")
            }
            StoreError::DuplicateId { .. } | StoreError::TargetOccupied { .. } => {
                Some("Give one of the records a different id or delete the duplicate file.")
            }
            StoreError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            _ => None,
        }
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
