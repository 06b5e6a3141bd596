//! Error types and load outcome structures for the source registry.

use std::path::PathBuf;

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Document validation error (wrong kind, missing id).
    #[error("validation error: {0}")]
    Validation(String),

    /// Filesystem watcher error.
    #[error("watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Result alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Outcome of loading a single plug-in file.
#[derive(Debug)]
pub struct LoadOutcome {
    pub path: PathBuf,
    pub status: LoadStatus,
}

/// Status of a single file load attempt.
#[derive(Debug)]
pub enum LoadStatus {
    /// File parsed; this many items were registered.
    Loaded { items: usize },
    /// File was skipped (dotfile, pattern mismatch).
    Skipped { reason: String },
    /// Parse or validation error; the file contributes no items.
    Failed { error: String },
}
