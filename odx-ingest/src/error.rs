//! Error types for odx-ingest
//!
//! Fatal conditions abort the current unit of work (one file, one build,
//! one lookup). Tolerated row-level problems never surface here; they are
//! logged and counted in the per-operation reports instead.

use std::path::PathBuf;
use thiserror::Error;

/// Ingestion, reconstruction and recovery errors
#[derive(Debug, Error)]
pub enum IngestError {
    /// Well identifier does not match `[A-H]<digits>`
    #[error("Invalid well identifier: {0:?}")]
    InvalidWellIdentifier(String),

    /// No explicit plate id and no `plate_<digits>` in the file name
    #[error("Could not determine plate id from filename: {0}")]
    MissingPlateIdentifier(String),

    /// No explicit experiment id and no `exp <digits>` in the file name
    #[error("Could not determine experiment id from filename: {0}")]
    MissingExperimentIdentifier(String),

    /// Plate file too short to hold a header and one data row
    #[error("Malformed plate file {0}: fewer than 2 rows")]
    MalformedPlateFile(String),

    /// Experiment file lacks the `type` or `value` header column
    #[error("Malformed experiment file {file}: missing {column:?} column")]
    MalformedExperimentFile { file: String, column: &'static str },

    /// Mandatory experiment scalar absent after scanning the whole file
    #[error("Missing {parameter} in {file}")]
    MissingExperimentParameter { file: String, parameter: &'static str },

    /// Experiment scalar present but unusable (zero or negative)
    #[error("Invalid {parameter} for experiment {experiment}: {value}")]
    InvalidExperimentParameter {
        experiment: String,
        parameter: &'static str,
        value: f64,
    },

    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage failure while persisting one file; the batch was rolled back
    #[error("Ingestion of {file} failed: {source}")]
    IngestionFailed {
        file: String,
        #[source]
        source: sqlx::Error,
    },

    /// Generated text could not be turned into a table
    #[error("Table recovery failed: {0}")]
    TableRecovery(String),

    /// Path given on the command line is neither a file nor a directory
    #[error("Not a file or directory: {0}")]
    InvalidPath(PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Common error: {0}")]
    Common(#[from] odx_common::Error),
}

/// Result type for odx-ingest operations
pub type IngestResult<T> = Result<T, IngestError>;
