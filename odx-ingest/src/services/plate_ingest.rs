//! Plate ingestion
//!
//! One plate file is one unit of work: parse, then insert every reading in
//! a single transaction. Any storage failure rolls the whole file back.

use crate::db::readings;
use crate::error::{IngestError, IngestResult};
use crate::parsers::plate_csv::parse_plate_csv;
use crate::services::file_scanner::{collect_input_files, display_name, NamePattern};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const DEFAULT_PLATE_PATTERN: &str = "plate_*_abs.csv";

/// Outcome of one successfully ingested plate file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateIngestReport {
    pub file: String,
    pub plate_id: i64,
    /// Readings written; equals the number parsed
    pub inserted: u64,
    pub skipped_headers: Vec<String>,
    pub skipped_cells: usize,
}

/// Per-file outcome of a batch run
#[derive(Debug)]
pub struct FileOutcome<T> {
    pub path: PathBuf,
    pub result: IngestResult<T>,
}

/// Batch outcome: every matched file appears exactly once, in processing order
#[derive(Debug)]
pub struct BatchReport<T> {
    pub files: Vec<FileOutcome<T>>,
}

impl<T> BatchReport<T> {
    pub fn succeeded(&self) -> impl Iterator<Item = (&PathBuf, &T)> {
        self.files
            .iter()
            .filter_map(|f| f.result.as_ref().ok().map(|r| (&f.path, r)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&PathBuf, &IngestError)> {
        self.files
            .iter()
            .filter_map(|f| f.result.as_ref().err().map(|e| (&f.path, e)))
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }
}

/// Ingest one plate file.
///
/// The plate id is `plate_id` when given, otherwise taken from the file
/// name. Returns the number of readings inserted.
pub async fn ingest_plate_file(
    pool: &SqlitePool,
    path: &Path,
    plate_id: Option<i64>,
) -> IngestResult<PlateIngestReport> {
    let file = display_name(path);
    let text = std::fs::read_to_string(path)?;
    ingest_plate_text(pool, &text, &file, plate_id).await
}

/// Ingest plate CSV text already in memory
pub async fn ingest_plate_text(
    pool: &SqlitePool,
    text: &str,
    file: &str,
    plate_id: Option<i64>,
) -> IngestResult<PlateIngestReport> {
    let parsed = parse_plate_csv(text, file, plate_id)?;

    if parsed.skipped_cells > 0 {
        warn!(
            file,
            plate_id = parsed.plate_id,
            skipped = parsed.skipped_cells,
            "Non-numeric well values skipped"
        );
    }

    let failed = |source| IngestError::IngestionFailed {
        file: file.to_string(),
        source,
    };

    // Dropping the transaction without commit rolls it back
    let mut tx = pool.begin().await.map_err(failed)?;
    let inserted = readings::bulk_insert(&mut *tx, &parsed.readings)
        .await
        .map_err(failed)?;
    tx.commit().await.map_err(failed)?;

    info!(file, plate_id = parsed.plate_id, inserted, "Plate ingested");

    Ok(PlateIngestReport {
        file: file.to_string(),
        plate_id: parsed.plate_id,
        inserted,
        skipped_headers: parsed.skipped_headers,
        skipped_cells: parsed.skipped_cells,
    })
}

/// Ingest a plate file or every matching plate file in a directory.
///
/// Files are processed sequentially. A failing file is logged and recorded
/// in the report; the remaining files are still processed. An explicit
/// `plate_id` only makes sense for a single file and is applied to each
/// file otherwise.
pub async fn ingest_plate_path(
    pool: &SqlitePool,
    path: &Path,
    pattern: &NamePattern,
    plate_id: Option<i64>,
) -> IngestResult<BatchReport<PlateIngestReport>> {
    let files = collect_input_files(path, pattern)?;
    if plate_id.is_some() && files.len() > 1 {
        warn!(
            files = files.len(),
            "Explicit plate id applied to every file in the batch"
        );
    }

    let mut report = BatchReport { files: Vec::new() };

    for file in files {
        let result = ingest_plate_file(pool, &file, plate_id).await;
        if let Err(e) = &result {
            error!(file = %file.display(), "Plate ingestion failed: {}", e);
        }
        report.files.push(FileOutcome { path: file, result });
    }

    Ok(report)
}
