//! Feature reconstruction
//!
//! Joins one experiment with the readings of one plate into a fixed-width
//! feature matrix. `feature_1..feature_15` carry the experiment's dose
//! values in slot order (zero-filled, extra doses dropped); `feature_16` is
//! `cell_concentration / (dilution * k)` for the k-th reading (1-based) in
//! persisted order. Dose features are the same on every row.

use crate::db::{experiments, readings};
use crate::error::{IngestError, IngestResult};
use crate::parsers::experiment_csv::DILUTION_KEY;
use csv::Writer;
use odx_common::db::ReagentValue;
use serde::Serialize;
use sqlx::SqlitePool;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Dose-derived feature slots
pub const DOSE_FEATURES: usize = 15;

/// Total features per row, dose slots plus the concentration ratio
pub const FEATURE_COUNT: usize = DOSE_FEATURES + 1;

/// One reading with its feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub features: [f64; FEATURE_COUNT],
    pub plate_id: i64,
    pub row: char,
    pub column: u32,
    pub time_seconds: i64,
    /// Measured absorbance
    pub value: f64,
}

/// Build the feature matrix for `experiment_id` × `plate_id`.
///
/// Fails with [`IngestError::NotFound`] when the experiment or the plate's
/// readings are missing, and rejects a zero dilution before touching the
/// readings. Same persisted state in, same rows out.
pub async fn build_features(
    pool: &SqlitePool,
    experiment_id: i64,
    plate_id: i64,
) -> IngestResult<Vec<FeatureRow>> {
    let experiment = experiments::get_by_id(pool, experiment_id)
        .await?
        .ok_or_else(|| IngestError::NotFound(format!("experiment {}", experiment_id)))?;

    if experiment.dilution == 0.0 || !experiment.dilution.is_finite() {
        return Err(IngestError::InvalidExperimentParameter {
            experiment: experiment_id.to_string(),
            parameter: DILUTION_KEY,
            value: experiment.dilution,
        });
    }

    let plate_readings = readings::list_by_plate(pool, plate_id).await?;
    if plate_readings.is_empty() {
        return Err(IngestError::NotFound(format!("readings for plate {}", plate_id)));
    }

    let doses = ordered_doses(pool, experiment_id).await?;
    if doses.len() > DOSE_FEATURES {
        warn!(
            experiment_id,
            doses = doses.len(),
            "More doses than feature slots, extra doses dropped"
        );
    }

    let mut dose_features = [0.0; DOSE_FEATURES];
    for (slot, dose) in dose_features.iter_mut().zip(&doses) {
        *slot = dose.value;
    }

    let rows = plate_readings
        .into_iter()
        .enumerate()
        .map(|(idx, reading)| {
            let mut features = [0.0; FEATURE_COUNT];
            features[..DOSE_FEATURES].copy_from_slice(&dose_features);
            let row_index = (idx + 1) as f64;
            features[DOSE_FEATURES] = experiment.cell_concentration / (experiment.dilution * row_index);

            FeatureRow {
                features,
                plate_id: reading.plate_id,
                row: reading.row,
                column: reading.column,
                time_seconds: reading.time_seconds,
                value: reading.value,
            }
        })
        .collect::<Vec<_>>();

    info!(experiment_id, plate_id, rows = rows.len(), "Features built");
    Ok(rows)
}

/// Doses in feature slot order.
///
/// Uses the persisted slot mapping; experiments without one fall back to
/// ascending reagent id.
async fn ordered_doses(pool: &SqlitePool, experiment_id: i64) -> IngestResult<Vec<ReagentValue>> {
    let slotted = experiments::list_slotted_reagent_values(pool, experiment_id).await?;
    if !slotted.is_empty() {
        return Ok(slotted);
    }

    let mut doses = experiments::list_reagent_values(pool, experiment_id).await?;
    if !doses.is_empty() {
        debug!(experiment_id, "No feature slot mapping, ordering doses by reagent id");
    }
    doses.sort_by_key(|dose| dose.reagent_id);
    Ok(doses)
}

// ============================================================================
// Summary
// ============================================================================

/// Statistics of one feature column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureStats {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; 0 for fewer than two rows
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSummary {
    pub experiment_id: i64,
    pub plate_id: i64,
    pub records: usize,
    pub features: usize,
    pub stats: Vec<FeatureStats>,
}

pub fn feature_name(index: usize) -> String {
    format!("feature_{}", index + 1)
}

pub fn summarize(experiment_id: i64, plate_id: i64, rows: &[FeatureRow]) -> FeatureSummary {
    let stats = (0..FEATURE_COUNT)
        .map(|idx| {
            let column: Vec<f64> = rows.iter().map(|row| row.features[idx]).collect();
            column_stats(feature_name(idx), &column)
        })
        .collect();

    FeatureSummary {
        experiment_id,
        plate_id,
        records: rows.len(),
        features: FEATURE_COUNT,
        stats,
    }
}

fn column_stats(name: String, values: &[f64]) -> FeatureStats {
    let count = values.len();
    if count == 0 {
        return FeatureStats {
            name,
            count,
            mean: 0.0,
            std: 0.0,
            min: 0.0,
            max: 0.0,
        };
    }

    let mean = values.iter().sum::<f64>() / count as f64;
    let std = if count > 1 {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        var.sqrt()
    } else {
        0.0
    };

    FeatureStats {
        name,
        count,
        mean,
        std,
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

// ============================================================================
// CSV export
// ============================================================================

/// Default export file name for an experiment/plate pair
pub fn default_output_name(experiment_id: i64, plate_id: i64) -> String {
    format!("features_exp{}_plate{}.csv", experiment_id, plate_id)
}

/// Write the feature matrix as CSV with a header row
pub fn write_features<W: Write>(rows: &[FeatureRow], writer: W) -> IngestResult<()> {
    let mut csv = Writer::from_writer(writer);

    let mut header: Vec<String> = (0..FEATURE_COUNT).map(feature_name).collect();
    header.extend(
        ["plate_id", "row_id", "column_id", "seconds_time_sample", "absorbance"]
            .iter()
            .map(|s| s.to_string()),
    );
    csv.write_record(&header)?;

    for row in rows {
        let mut record: Vec<String> = row.features.iter().map(f64::to_string).collect();
        record.push(row.plate_id.to_string());
        record.push(row.row.to_string());
        record.push(row.column.to_string());
        record.push(row.time_seconds.to_string());
        record.push(row.value.to_string());
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

pub fn write_features_file(rows: &[FeatureRow], path: &Path) -> IngestResult<()> {
    let file = std::fs::File::create(path)?;
    write_features(rows, file)?;
    info!(path = %path.display(), rows = rows.len(), "Feature matrix written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(features: [f64; FEATURE_COUNT], value: f64) -> FeatureRow {
        FeatureRow {
            features,
            plate_id: 1,
            row: 'A',
            column: 1,
            time_seconds: 0,
            value,
        }
    }

    #[test]
    fn test_summary_statistics() {
        let mut a = [0.0; FEATURE_COUNT];
        let mut b = [0.0; FEATURE_COUNT];
        a[0] = 1.0;
        b[0] = 3.0;
        a[15] = 2.0;
        b[15] = 1.0;

        let summary = summarize(4, 1, &[row(a, 0.1), row(b, 0.2)]);
        assert_eq!(summary.records, 2);
        assert_eq!(summary.features, 16);
        assert_eq!(summary.stats.len(), 16);

        let first = &summary.stats[0];
        assert_eq!(first.name, "feature_1");
        assert_eq!(first.mean, 2.0);
        assert!((first.std - 2.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!((first.min, first.max), (1.0, 3.0));

        assert_eq!(summary.stats[15].name, "feature_16");
        assert_eq!(summary.stats[15].max, 2.0);
    }

    #[test]
    fn test_single_row_has_zero_std() {
        let summary = summarize(1, 1, &[row([1.0; FEATURE_COUNT], 0.5)]);
        assert!(summary.stats.iter().all(|s| s.std == 0.0));
    }

    #[test]
    fn test_csv_export_layout() {
        let mut features = [0.0; FEATURE_COUNT];
        features[0] = 2.5;
        features[15] = 0.5;

        let mut out = Vec::new();
        write_features(&[row(features, 0.125)], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("feature_1,feature_2,"));
        assert!(header.ends_with("feature_16,plate_id,row_id,column_id,seconds_time_sample,absorbance"));

        let fields: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(fields.len(), 21);
        assert_eq!(fields[0], "2.5");
        assert_eq!(fields[15], "0.5");
        assert_eq!(&fields[16..], &["1", "A", "1", "0", "0.125"]);
    }

    #[test]
    fn test_default_output_name() {
        assert_eq!(default_output_name(3, 12), "features_exp3_plate12.csv");
    }
}
