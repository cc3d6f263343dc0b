//! Reagent catalog seeding
//!
//! Loads a `name,concentration,unit` catalog CSV. Liquids carry no
//! concentration (`NULL` or empty) and are stored as 0.0. Names already in
//! the catalog are left untouched, so re-seeding is a no-op.

use crate::db::reagents;
use crate::error::{IngestError, IngestResult};
use crate::parsers::parse_finite;
use csv::ReaderBuilder;
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};

/// One catalog line ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    pub name: String,
    pub concentration: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedReport {
    pub inserted: usize,
    /// Names that were already present
    pub unchanged: usize,
    /// Lines dropped for an empty name or a non-numeric concentration
    pub skipped: Vec<String>,
}

/// Parse catalog CSV text
pub fn parse_catalog(text: &str, file: &str) -> IngestResult<(Vec<CatalogRow>, Vec<String>)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let header = reader.headers()?.clone();
    let find = |name: &str| header.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
    let name_idx = find("name").ok_or_else(|| {
        odx_common::Error::InvalidInput(format!("{}: missing \"name\" column", file))
    })?;
    let concentration_idx = find("concentration");
    let unit_idx = find("unit");

    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for record in reader.records() {
        let record = record?;
        let name = record.get(name_idx).map(str::trim).unwrap_or("");
        if name.is_empty() {
            continue;
        }

        let concentration_text = concentration_idx
            .and_then(|idx| record.get(idx))
            .map(str::trim)
            .unwrap_or("");
        let concentration = if concentration_text.is_empty()
            || concentration_text.eq_ignore_ascii_case("null")
        {
            0.0
        } else {
            match parse_finite(concentration_text) {
                Some(v) => v,
                None => {
                    warn!(
                        file,
                        reagent = name,
                        value = concentration_text,
                        "Skipping catalog row with non-numeric concentration"
                    );
                    skipped.push(name.to_string());
                    continue;
                }
            }
        };

        rows.push(CatalogRow {
            name: name.to_string(),
            concentration,
            unit: unit_idx
                .and_then(|idx| record.get(idx))
                .map(str::trim)
                .unwrap_or("")
                .to_string(),
        });
    }

    Ok((rows, skipped))
}

/// Seed the catalog from a CSV file
pub async fn seed_reagents_file(pool: &SqlitePool, path: &Path) -> IngestResult<SeedReport> {
    if !path.is_file() {
        return Err(IngestError::InvalidPath(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    seed_reagents(pool, &text, &path.display().to_string()).await
}

pub async fn seed_reagents(pool: &SqlitePool, text: &str, file: &str) -> IngestResult<SeedReport> {
    let (rows, skipped) = parse_catalog(text, file)?;
    let mut report = SeedReport {
        skipped,
        ..Default::default()
    };

    for row in &rows {
        match reagents::insert_if_absent(pool, &row.name, row.concentration, &row.unit).await? {
            Some(_) => report.inserted += 1,
            None => report.unchanged += 1,
        }
    }

    info!(
        file,
        inserted = report.inserted,
        unchanged = report.unchanged,
        "Reagent catalog seeded"
    );
    Ok(report)
}
