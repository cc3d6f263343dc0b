//! Plate growth summary
//!
//! Condenses a plate time series into a short plain-text report: which
//! wells grew most and least between the first and the last sample, and
//! the spread of final absorbance and growth across the plate. The report
//! is meant as context for a protocol generation request.

use crate::error::IngestResult;
use crate::parsers::plate_csv::{parse_plate_csv, ParsedPlate};
use crate::parsers::plate_id_from_filename;
use crate::wells::Well;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Wells listed at each end of the growth ranking
pub const RANKED_WELLS: usize = 5;

/// Growth of one well between the first and last sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WellGrowth {
    #[serde(serialize_with = "serialize_well")]
    pub well: Well,
    pub initial: f64,
    #[serde(rename = "final")]
    pub final_value: f64,
    pub growth: f64,
}

fn serialize_well<S: serde::Serializer>(well: &Well, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(well)
}

/// Mean and sample standard deviation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spread {
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthSummary {
    pub time_points: usize,
    pub wells: usize,
    pub first_time_seconds: i64,
    pub last_time_seconds: i64,
    /// Largest growth first
    pub top: Vec<WellGrowth>,
    /// Smallest growth first
    pub bottom: Vec<WellGrowth>,
    pub final_absorbance: Spread,
    pub growth: Spread,
}

impl GrowthSummary {
    /// Summarize a parsed plate; `None` when it holds no readings
    pub fn from_plate(plate: &ParsedPlate) -> Option<Self> {
        let first_time = plate.readings.first()?.time_seconds;
        let last_time = plate.readings.last()?.time_seconds;

        // Wells in header order with their first/last sample values
        let mut order: Vec<Well> = Vec::new();
        let mut initial: HashMap<Well, f64> = HashMap::new();
        let mut final_values: HashMap<Well, f64> = HashMap::new();

        for reading in &plate.readings {
            let well = Well::new(reading.row, reading.column);
            if !order.contains(&well) {
                order.push(well);
            }
            if reading.time_seconds == first_time {
                initial.entry(well).or_insert(reading.value);
            }
            if reading.time_seconds == last_time {
                final_values.insert(well, reading.value);
            }
        }

        let growth: Vec<WellGrowth> = order
            .iter()
            .filter_map(|well| {
                let initial = *initial.get(well)?;
                let final_value = *final_values.get(well)?;
                Some(WellGrowth {
                    well: *well,
                    initial,
                    final_value,
                    growth: final_value - initial,
                })
            })
            .collect();

        let mut top = growth.clone();
        top.sort_by(|a, b| b.growth.total_cmp(&a.growth));
        top.truncate(RANKED_WELLS);

        let mut bottom = growth.clone();
        bottom.sort_by(|a, b| a.growth.total_cmp(&b.growth));
        bottom.truncate(RANKED_WELLS);

        let finals: Vec<f64> = order.iter().filter_map(|w| final_values.get(w).copied()).collect();
        let gains: Vec<f64> = growth.iter().map(|g| g.growth).collect();

        Some(Self {
            time_points: plate.data_rows,
            wells: order.len(),
            first_time_seconds: first_time,
            last_time_seconds: last_time,
            top,
            bottom,
            final_absorbance: spread(&finals),
            growth: spread(&gains),
        })
    }
}

fn spread(values: &[f64]) -> Spread {
    if values.is_empty() {
        return Spread { mean: 0.0, std: 0.0 };
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = if values.len() > 1 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    Spread { mean, std }
}

impl fmt::Display for GrowthSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ABSORBANCE DATA ANALYSIS:")?;
        writeln!(f, "- Time points measured: {} samples", self.time_points)?;
        writeln!(f, "- Wells measured: {} wells", self.wells)?;
        writeln!(
            f,
            "- Time range: {} to {} seconds ({:.1} hours)",
            self.first_time_seconds,
            self.last_time_seconds,
            self.last_time_seconds as f64 / 3600.0
        )?;

        writeln!(f)?;
        writeln!(f, "Top {} performing wells (by growth):", RANKED_WELLS)?;
        for well in &self.top {
            write_well(f, well)?;
        }

        writeln!(f)?;
        writeln!(f, "Bottom {} performing wells:", RANKED_WELLS)?;
        for well in &self.bottom {
            write_well(f, well)?;
        }

        writeln!(f)?;
        writeln!(f, "Overall statistics:")?;
        writeln!(
            f,
            "  - Mean final absorbance: {:.3} ± {:.3}",
            self.final_absorbance.mean, self.final_absorbance.std
        )?;
        writeln!(f, "  - Mean growth: {:.3} ± {:.3}", self.growth.mean, self.growth.std)
    }
}

fn write_well(f: &mut fmt::Formatter<'_>, well: &WellGrowth) -> fmt::Result {
    writeln!(
        f,
        "  - Well {}: Initial={:.3}, Final={:.3}, Growth={:.3}",
        well.well, well.initial, well.final_value, well.growth
    )
}

/// Summarize plate CSV text.
///
/// The plate id plays no part in the report, so files without one in
/// their name are accepted.
pub fn summarize_plate_text(text: &str, file: &str) -> IngestResult<Option<GrowthSummary>> {
    let plate_id = plate_id_from_filename(file).unwrap_or_default();
    let plate = parse_plate_csv(text, file, Some(plate_id))?;
    Ok(GrowthSummary::from_plate(&plate))
}

pub fn summarize_plate_file(path: &Path) -> IngestResult<Option<GrowthSummary>> {
    let text = std::fs::read_to_string(path)?;
    summarize_plate_text(&text, &path.display().to_string())
}
