//! Error types for glucoscope-store.

use std::path::PathBuf;

/// Result type for glucoscope-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a dataset load.
///
/// Row-level problems (malformed timestamps, missing curve ids) are not
/// errors; they are collected in a [`LoadReport`](crate::LoadReport).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to open or read a dataset file.
    #[error("Failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The CSV stream itself could not be read.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The JSON document is not an array of row objects.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The file extension does not name a supported format.
    #[error("Unsupported dataset format: {} (expected .csv, .tsv or .json)", .0.display())]
    UnsupportedFormat(PathBuf),
}
