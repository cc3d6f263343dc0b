//! Recovery of a `name,concentration,unit` table from generated free text
//!
//! Generative models wrap the table in fenced code blocks, prefix it with a
//! language tag and leave unquoted commas inside reagent names. Recovery:
//!
//! 1. When the text contains a fence marker, keep the first fragment that
//!    holds the table header.
//! 2. Drop a leading bare language tag (`csv`, `text`).
//! 3. Repair lines with more than three fields (a separator inside an
//!    unquoted name): the last two comma tokens are concentration and unit,
//!    everything before them is the name. This is a heuristic; a name that
//!    ends in a number followed by a unit-like word is mis-split.
//! 4. Parse the result; any remaining row failure aborts the whole table.

use crate::error::{IngestError, IngestResult};
use crate::parsers::parse_finite;
use csv::ReaderBuilder;
use serde::Serialize;
use tracing::debug;

const FENCE: &str = "```";
const HEADER: &str = "name,concentration,unit";
const PARTIAL_HEADER: &str = "name,concentration";
const LANGUAGE_TAGS: [&str; 2] = ["csv", "text"];
const NULL_TOKENS: [&str; 4] = ["null", "nan", "none", "n/a"];

/// One recovered table row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveredRow {
    pub name: String,
    /// `None` when the cell was empty, absent or a null token
    pub concentration: Option<f64>,
    pub unit: String,
}

/// Recovered table plus repair statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveredTable {
    pub rows: Vec<RecoveredRow>,
    /// Lines whose extra separators were folded into the name
    pub repaired_lines: usize,
}

/// Header column positions
struct Layout {
    width: usize,
    name: usize,
    concentration: usize,
    unit: usize,
}

impl Layout {
    fn from_header(line: &str) -> IngestResult<Self> {
        let fields = split_record(line)?;
        let find = |wanted: &str| {
            fields
                .iter()
                .position(|f| f.trim().eq_ignore_ascii_case(wanted))
                .ok_or_else(|| {
                    IngestError::TableRecovery(format!("header {:?} lacks column {:?}", line, wanted))
                })
        };

        Ok(Self {
            width: fields.len(),
            name: find("name")?,
            concentration: find("concentration")?,
            unit: find("unit")?,
        })
    }
}

/// Recover the reagent table from free-form text
pub fn recover_table(text: &str) -> IngestResult<RecoveredTable> {
    let fragment = select_fragment(text);
    let lines = strip_language_tag(fragment);

    let mut layout: Option<Layout> = None;
    let mut table = RecoveredTable::default();

    for (line_no, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        if line.is_empty() || is_language_tag(line) {
            continue;
        }

        if is_header(line) {
            match layout {
                None => layout = Some(Layout::from_header(line)?),
                Some(_) => debug!(line = line_no, "Ignoring repeated table header"),
            }
            continue;
        }

        let layout = match &layout {
            Some(layout) => layout,
            None => {
                debug!(line = line_no, text = line, "Dropping commentary before table header");
                continue;
            }
        };

        // More than two separators outside quotes: fold the name
        let fields = split_record(line)?;
        let row = if fields.len() > 3 {
            table.repaired_lines += 1;
            let [name, concentration, unit] = fold_name_fields(line);
            finish_row(&name, &concentration, &unit, line)?
        } else {
            build_row(layout, &fields, line)?
        };

        table.rows.push(row);
    }

    if layout.is_none() {
        return Err(IngestError::TableRecovery(format!(
            "no {:?} header found in generated text",
            HEADER
        )));
    }

    Ok(table)
}

/// Pick the fenced fragment holding the header; the whole text when unfenced.
fn select_fragment(text: &str) -> &str {
    let text = text.trim();
    if !text.contains(FENCE) {
        return text;
    }

    text.split(FENCE)
        .find(|part| {
            let lower = part.to_lowercase();
            lower.contains(HEADER) || lower.contains(PARTIAL_HEADER)
        })
        .map(str::trim)
        .unwrap_or(text)
}

fn strip_language_tag(fragment: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = fragment.lines().collect();
    if lines.first().is_some_and(|first| is_language_tag(first.trim())) {
        lines.remove(0);
    }
    lines
}

fn is_language_tag(line: &str) -> bool {
    LANGUAGE_TAGS.iter().any(|tag| line.eq_ignore_ascii_case(tag))
}

fn is_header(line: &str) -> bool {
    line.to_lowercase().contains(HEADER) || line.starts_with("name,")
}

/// Heuristic repair: last two comma tokens are concentration and unit,
/// the rest is the name.
fn fold_name_fields(line: &str) -> [String; 3] {
    let parts: Vec<&str> = line.split(',').collect();
    let split = parts.len().saturating_sub(2);
    [
        parts[..split].join(","),
        parts.get(split).copied().unwrap_or("").to_string(),
        parts.get(split + 1).copied().unwrap_or("").to_string(),
    ]
}

/// Quote-aware split of a single CSV line
fn split_record(line: &str) -> IngestResult<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(str::to_string).collect()),
        None => Ok(Vec::new()),
    }
}

fn build_row(layout: &Layout, fields: &[String], line: &str) -> IngestResult<RecoveredRow> {
    if fields.len() > layout.width {
        return Err(IngestError::TableRecovery(format!(
            "expected {} fields, saw {} in line {:?}",
            layout.width,
            fields.len(),
            line
        )));
    }

    let cell = |idx: usize| fields.get(idx).map(String::as_str).unwrap_or("");
    finish_row(cell(layout.name), cell(layout.concentration), cell(layout.unit), line)
}

fn finish_row(name: &str, concentration: &str, unit: &str, line: &str) -> IngestResult<RecoveredRow> {
    let name = name.trim();
    if name.is_empty() {
        return Err(IngestError::TableRecovery(format!("empty reagent name in line {:?}", line)));
    }

    Ok(RecoveredRow {
        name: name.to_string(),
        concentration: parse_concentration(concentration.trim(), line)?,
        unit: unit.trim().to_string(),
    })
}

fn parse_concentration(cell: &str, line: &str) -> IngestResult<Option<f64>> {
    if cell.is_empty() || NULL_TOKENS.iter().any(|t| cell.eq_ignore_ascii_case(t)) {
        return Ok(None);
    }
    parse_finite(cell).map(Some).ok_or_else(|| {
        IngestError::TableRecovery(format!("non-numeric concentration {:?} in line {:?}", cell, line))
    })
}
