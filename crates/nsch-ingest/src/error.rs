//! Error types for NSCH ingestion.

use std::path::PathBuf;

use nsch_model::ParseError;
use thiserror::Error;

/// Errors that can occur while loading a run's inputs.
#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    /// Directory not found or not readable.
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Failed to read directory entries.
    #[error("failed to read directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read file.
    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Discovery Errors ===
    /// No input file for a requested survey year.
    #[error("no {kind} file for survey year {year} in {dir}")]
    MissingYear {
        year: u16,
        kind: &'static str,
        dir: PathBuf,
    },

    /// More than one candidate file for a survey year.
    #[error("{count} {kind} files match survey year {year}: {first} and {second}")]
    AmbiguousYear {
        year: u16,
        kind: &'static str,
        count: usize,
        first: PathBuf,
        second: PathBuf,
    },

    // === CSV Errors ===
    /// Failed to parse CSV with Polars.
    #[error("failed to parse CSV {path}: {message}")]
    CsvParse { path: PathBuf, message: String },

    /// Two headers fold to the same lowercase name.
    #[error("column `{column}` appears twice in {path} after case folding")]
    DuplicateColumn { column: String, path: PathBuf },

    /// Required column not found.
    #[error("required column '{column}' not found in {path}")]
    MissingColumn { column: String, path: PathBuf },

    // === Label Definition Errors ===
    #[error("{path}: {source}")]
    Labels {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    // === Configuration Errors ===
    #[error("failed to parse configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    // === DataFrame Errors ===
    /// Failed DataFrame operation.
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },
}

impl From<polars::prelude::PolarsError> for IngestError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
