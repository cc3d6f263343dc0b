//! Experiment ingestion
//!
//! A dosing sheet becomes one experiment row, its matched reagent doses and
//! their feature slots. Dose names resolve against the reagent catalog by
//! exact match; unmatched names are reported and left out.

use crate::db::experiments::{self, NewReagentValue};
use crate::db::reagents::ReagentCatalog;
use crate::error::{IngestError, IngestResult};
use crate::parsers::experiment_csv::parse_experiment_csv;
use crate::parsers::experiment_id_from_filename;
use crate::services::file_scanner::{collect_input_files, display_name, NamePattern};
use crate::services::plate_ingest::{BatchReport, FileOutcome};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{error, info, warn};

pub const DEFAULT_EXPERIMENT_PATTERN: &str = "*exp*.csv";

/// Outcome of one successfully ingested dosing sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentIngestReport {
    pub file: String,
    pub experiment_id: i64,
    /// Doses persisted (and slotted)
    pub doses_inserted: usize,
    /// Dose names with no catalog entry, in sheet order
    pub skipped_reagents: Vec<String>,
    /// Rows dropped for a non-numeric value
    pub skipped_rows: Vec<String>,
}

/// Ingest one dosing sheet from disk
pub async fn ingest_experiment_file(
    pool: &SqlitePool,
    catalog: &dyn ReagentCatalog,
    path: &Path,
    experiment_id: Option<i64>,
) -> IngestResult<ExperimentIngestReport> {
    let file = display_name(path);
    let text = std::fs::read_to_string(path)?;
    ingest_experiment_text(pool, catalog, &text, &file, experiment_id).await
}

/// Ingest dosing sheet text.
///
/// The experiment id is `experiment_id` when given, otherwise recovered from
/// the file name (`exp <digits>`). Scalars must be strictly positive.
pub async fn ingest_experiment_text(
    pool: &SqlitePool,
    catalog: &dyn ReagentCatalog,
    text: &str,
    file: &str,
    experiment_id: Option<i64>,
) -> IngestResult<ExperimentIngestReport> {
    let experiment_id = experiment_id
        .or_else(|| experiment_id_from_filename(file))
        .ok_or_else(|| IngestError::MissingExperimentIdentifier(file.to_string()))?;

    let parsed = parse_experiment_csv(text, file)?;
    parsed.validate(file)?;

    // Resolve names before opening the transaction
    let mut matched = Vec::new();
    let mut skipped_reagents = Vec::new();
    for dose in &parsed.doses {
        match catalog.find_reagent_by_name(&dose.reagent_name).await? {
            Some(reagent) => matched.push(NewReagentValue {
                reagent_id: reagent.id,
                value: dose.value,
                unit: dose.unit.clone(),
            }),
            None => {
                warn!(file, reagent = %dose.reagent_name, "Reagent not in catalog, skipping");
                skipped_reagents.push(dose.reagent_name.clone());
            }
        }
    }

    let failed = |source| IngestError::IngestionFailed {
        file: file.to_string(),
        source,
    };

    let mut tx = pool.begin().await.map_err(failed)?;

    let experiment_id = experiments::insert(
        &mut *tx,
        Some(experiment_id),
        parsed.cell_concentration,
        parsed.dilution,
    )
    .await
    .map_err(failed)?;

    let value_ids = experiments::insert_reagent_values(&mut *tx, experiment_id, &matched)
        .await
        .map_err(failed)?;

    experiments::insert_feature_slots(&mut *tx, experiment_id, &assign_slots(&matched, &value_ids))
        .await
        .map_err(failed)?;

    tx.commit().await.map_err(failed)?;

    info!(
        file,
        experiment_id,
        doses = matched.len(),
        skipped = skipped_reagents.len(),
        "Experiment ingested"
    );

    Ok(ExperimentIngestReport {
        file: file.to_string(),
        experiment_id,
        doses_inserted: matched.len(),
        skipped_reagents,
        skipped_rows: parsed.skipped_rows,
    })
}

/// Slot order is ascending catalog id; ties keep sheet order.
///
/// Returns `(slot_index, reagent_value_id, reagent_id)` with 1-based slots.
fn assign_slots(values: &[NewReagentValue], value_ids: &[i64]) -> Vec<(i64, i64, i64)> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by_key(|&i| values[i].reagent_id);

    order
        .into_iter()
        .enumerate()
        .map(|(slot, i)| (slot as i64 + 1, value_ids[i], values[i].reagent_id))
        .collect()
}

/// Ingest a dosing sheet or every matching sheet in a directory
pub async fn ingest_experiment_path(
    pool: &SqlitePool,
    catalog: &dyn ReagentCatalog,
    path: &Path,
    pattern: &NamePattern,
    experiment_id: Option<i64>,
) -> IngestResult<BatchReport<ExperimentIngestReport>> {
    let files = collect_input_files(path, pattern)?;
    let mut report = BatchReport { files: Vec::new() };

    for file in files {
        let result = ingest_experiment_file(pool, catalog, &file, experiment_id).await;
        if let Err(e) = &result {
            error!(file = %file.display(), "Experiment ingestion failed: {}", e);
        }
        report.files.push(FileOutcome { path: file, result });
    }

    Ok(report)
}
