/// Error types for dataset preparation
///
/// Every filesystem-facing failure carries the offending path so the
/// per-item log lines can name the file that was skipped.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the dataset and normalizer modules
pub type Result<T> = std::result::Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rename target is already taken by another file
    #[error("target already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("failed to decode RAW file {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("failed to encode {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },

    /// The produced file could not be read back after writing
    #[error("failed to read back {}: {reason}", path.display())]
    VerifyFailed { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl DatasetError {
    /// Wrap an `std::io::Error` with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DatasetError::Io {
            path: path.into(),
            source,
        }
    }
}
