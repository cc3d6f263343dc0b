//! Absorbance plate CSV parser
//!
//! Plate exports are wide time series:
//! - Row 0: header; column 0 is the time axis label, every other cell a
//!   well identifier (`A1` .. `H12`)
//! - Rows 1..: column 0 is the sample time in seconds, the remaining
//!   columns the optical density of each well at that time
//!
//! The parser normalizes this into one [`Reading`] per (well, time) cell.

use crate::error::{IngestError, IngestResult};
use crate::parsers::{parse_finite, plate_id_from_filename};
use crate::wells;
use csv::ReaderBuilder;
use odx_common::db::Reading;
use tracing::{debug, warn};

/// Header column that decoded to a well
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WellColumn {
    index: usize,
    row: char,
    column: u32,
}

/// Result of parsing one plate file
#[derive(Debug, Clone, Default)]
pub struct ParsedPlate {
    pub plate_id: i64,
    /// Readings in file order (row by row, then header column order)
    pub readings: Vec<Reading>,
    /// Non-empty header cells that were not well identifiers
    pub skipped_headers: Vec<String>,
    /// Well cells that were present but not numeric
    pub skipped_cells: usize,
    /// Data rows that produced readings or were scanned for them
    pub data_rows: usize,
    /// 0-based file row where parsing stopped on a non-numeric time, if any
    pub stopped_at_row: Option<usize>,
}

/// Parse plate CSV text.
///
/// The plate id is `plate_id` when given, otherwise recovered from
/// `filename` (`plate_<digits>`). Without either the call fails with
/// [`IngestError::MissingPlateIdentifier`] before the content is looked at.
pub fn parse_plate_csv(
    text: &str,
    filename: &str,
    plate_id: Option<i64>,
) -> IngestResult<ParsedPlate> {
    let plate_id = plate_id
        .or_else(|| plate_id_from_filename(filename))
        .ok_or_else(|| IngestError::MissingPlateIdentifier(filename.to_string()))?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let rows = reader
        .records()
        .collect::<Result<Vec<_>, csv::Error>>()?;

    if rows.len() < 2 {
        return Err(IngestError::MalformedPlateFile(filename.to_string()));
    }

    let mut parsed = ParsedPlate {
        plate_id,
        ..Default::default()
    };

    let well_columns = decode_header(&rows[0], &mut parsed.skipped_headers);
    if !parsed.skipped_headers.is_empty() {
        debug!(
            file = filename,
            skipped = ?parsed.skipped_headers,
            "Ignoring non-well header columns"
        );
    }

    for (row_idx, row) in rows.iter().enumerate().skip(1) {
        let time_cell = row.get(0).map(str::trim).unwrap_or("");

        // Blank time cell: nothing to attach readings to
        if time_cell.is_empty() {
            continue;
        }

        // First non-numeric time ends the data block
        let time_seconds = match parse_time(time_cell) {
            Some(t) => t,
            None => {
                debug!(file = filename, row = row_idx, time = time_cell, "Stopping at non-numeric time");
                parsed.stopped_at_row = Some(row_idx);
                break;
            }
        };

        parsed.data_rows += 1;

        for well in &well_columns {
            let cell = match row.get(well.index) {
                Some(cell) => cell.trim(),
                None => continue,
            };
            if cell.is_empty() {
                continue;
            }

            match parse_finite(cell) {
                Some(value) => parsed.readings.push(Reading {
                    plate_id,
                    row: well.row,
                    column: well.column,
                    time_seconds,
                    value,
                }),
                None => {
                    warn!(
                        file = filename,
                        row = row_idx,
                        col = well.index,
                        value = cell,
                        "Skipping non-numeric well value"
                    );
                    parsed.skipped_cells += 1;
                }
            }
        }
    }

    Ok(parsed)
}

fn decode_header(header: &csv::StringRecord, skipped: &mut Vec<String>) -> Vec<WellColumn> {
    header
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(index, cell)| {
            let cell = cell.trim();
            if cell.is_empty() {
                return None;
            }
            match wells::decode(cell) {
                Ok((row, column)) => Some(WellColumn { index, row, column }),
                Err(_) => {
                    skipped.push(cell.to_string());
                    None
                }
            }
        })
        .collect()
}

/// Time cells are real numbers truncated toward zero; negative times are
/// not sample times.
fn parse_time(cell: &str) -> Option<i64> {
    parse_finite(cell)
        .map(f64::trunc)
        .filter(|t| *t >= 0.0 && *t <= i64::MAX as f64)
        .map(|t| t as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(row: char, column: u32, time_seconds: i64, value: f64) -> Reading {
        Reading {
            plate_id: 7,
            row,
            column,
            time_seconds,
            value,
        }
    }

    #[test]
    fn test_parses_wide_time_series() {
        let text = ",A1,A2\n0,0.1,0.2\n30,0.15,0.25\n";
        let parsed = parse_plate_csv(text, "plate_7_abs.csv", None).unwrap();

        assert_eq!(parsed.plate_id, 7);
        assert_eq!(
            parsed.readings,
            vec![
                reading('A', 1, 0, 0.1),
                reading('A', 2, 0, 0.2),
                reading('A', 1, 30, 0.15),
                reading('A', 2, 30, 0.25),
            ]
        );
        assert_eq!(parsed.data_rows, 2);
        assert_eq!(parsed.stopped_at_row, None);
    }

    #[test]
    fn test_missing_plate_id_is_fatal_for_any_content() {
        for text in ["", ",A1\n0,0.1\n", "garbage"] {
            assert!(matches!(
                parse_plate_csv(text, "abs.csv", None),
                Err(IngestError::MissingPlateIdentifier(_))
            ));
        }
    }

    #[test]
    fn test_explicit_plate_id_wins_over_filename() {
        let parsed = parse_plate_csv(",A1\n0,0.5\n", "plate_7_abs.csv", Some(99)).unwrap();
        assert_eq!(parsed.plate_id, 99);
        assert_eq!(parsed.readings[0].plate_id, 99);

        // Explicit id also rescues a file name without digits
        assert!(parse_plate_csv(",A1\n0,0.5\n", "abs.csv", Some(3)).is_ok());
    }

    #[test]
    fn test_fewer_than_two_rows_is_malformed() {
        for text in ["", ",A1,A2\n"] {
            assert!(matches!(
                parse_plate_csv(text, "plate_1.csv", None),
                Err(IngestError::MalformedPlateFile(_))
            ));
        }
    }

    #[test]
    fn test_undecodable_header_columns_are_skipped() {
        let text = "Time [s],A1,Temp,,B2,notes\n0,0.1,37.0,,0.2,ok\n";
        let parsed = parse_plate_csv(text, "plate_1.csv", None).unwrap();

        assert_eq!(parsed.skipped_headers, vec!["Temp".to_string(), "notes".to_string()]);
        assert_eq!(
            parsed
                .readings
                .iter()
                .map(|r| (r.row, r.column))
                .collect::<Vec<_>>(),
            vec![('A', 1), ('B', 2)]
        );
    }

    #[test]
    fn test_header_cells_are_trimmed_before_decoding() {
        let parsed = parse_plate_csv(", A1 ,B2 \n0,0.1,0.2\n", "plate_1.csv", None).unwrap();
        assert_eq!(parsed.readings.len(), 2);
        assert!(parsed.skipped_headers.is_empty());
    }

    #[test]
    fn test_stops_at_first_non_numeric_time() {
        let text = ",A1\n0,0.1\n30,0.2\nEnd of run,\n60,0.3\n";
        let parsed = parse_plate_csv(text, "plate_1.csv", None).unwrap();

        assert_eq!(parsed.readings.len(), 2);
        assert_eq!(parsed.stopped_at_row, Some(3));
        assert!(parsed.readings.iter().all(|r| r.time_seconds < 60));
    }

    #[test]
    fn test_time_is_truncated_to_integer() {
        let parsed = parse_plate_csv(",A1\n29.9,0.1\n1e2,0.2\n", "plate_1.csv", None).unwrap();
        let times: Vec<i64> = parsed.readings.iter().map(|r| r.time_seconds).collect();
        assert_eq!(times, vec![29, 100]);
    }

    #[test]
    fn test_non_numeric_and_empty_cells_are_skipped() {
        let text = ",A1,A2,A3\n0,0.1,OVRFLW,\n30,0.2,0.3\n";
        let parsed = parse_plate_csv(text, "plate_1.csv", None).unwrap();

        assert_eq!(parsed.skipped_cells, 1);
        assert_eq!(
            parsed.readings,
            vec![
                Reading { plate_id: 1, row: 'A', column: 1, time_seconds: 0, value: 0.1 },
                Reading { plate_id: 1, row: 'A', column: 1, time_seconds: 30, value: 0.2 },
                Reading { plate_id: 1, row: 'A', column: 2, time_seconds: 30, value: 0.3 },
            ]
        );
    }

    #[test]
    fn test_duplicate_time_rows_are_kept() {
        let parsed = parse_plate_csv(",A1\n0,0.1\n0,0.2\n", "plate_1.csv", None).unwrap();
        assert_eq!(parsed.readings.len(), 2);
        assert_eq!(parsed.readings[0].time_seconds, parsed.readings[1].time_seconds);
    }
}
