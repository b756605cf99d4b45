//! Error types for c14-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in c14-core
///
/// Every variant is fatal for the run that produced it. Per-record problems
/// (no usable age, unknown method label, unjoined dataset rows) are not
/// errors; they are logged and counted by the component that sees them.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The GeoJSON store could not be decoded
    #[error("malformed store '{path}': {source}")]
    MalformedStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{source_name}': {source}")]
    Csv {
        source_name: String,
        #[source]
        source: csv::Error,
    },

    /// An external table lacks a column the pipeline depends on
    #[error("schema mismatch: table '{table}' has no column '{column}'")]
    SchemaMismatch { table: String, column: String },

    /// Network fetch failed
    #[error("failed to fetch '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The downloaded archive could not be read
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A required entry is missing from the archive
    #[error("archive has no entry named '{0}'")]
    ArchiveEntryMissing(String),

    /// A site definition is unusable
    #[error("invalid site: {0}")]
    InvalidSite(String),

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
