//! Experiment dosing sheet parser
//!
//! Dosing sheets are key/value CSVs with header `type,value,Units`:
//!
//! ```text
//! type,value,Units
//! cell concentration,5.0,
//! dilution,10,
//! Glucose,2.5,g/L
//! ```
//!
//! Two reserved rows carry the experiment scalars; every other row is a
//! candidate reagent dose, resolved against the catalog later.

use crate::error::{IngestError, IngestResult};
use crate::parsers::parse_finite;
use csv::{ReaderBuilder, StringRecord};
use tracing::warn;

pub const CELL_CONCENTRATION_KEY: &str = "cell concentration";
pub const DILUTION_KEY: &str = "dilution";

/// Dose row not yet matched against the reagent catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateDose {
    /// Literal reagent name from the sheet (trimmed, case preserved)
    pub reagent_name: String,
    pub value: f64,
    pub unit: String,
}

/// Parsed dosing sheet
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExperiment {
    pub cell_concentration: f64,
    pub dilution: f64,
    /// Candidate doses in sheet order
    pub doses: Vec<CandidateDose>,
    /// Rows dropped because their value was not numeric
    pub skipped_rows: Vec<String>,
}

impl ParsedExperiment {
    /// Reject scalars that make feature reconstruction undefined.
    ///
    /// Parsing accepts any number; persistence requires both scalars to be
    /// strictly positive.
    pub fn validate(&self, experiment: &str) -> IngestResult<()> {
        validate_parameters(experiment, self.cell_concentration, self.dilution)
    }
}

/// Shared positivity check for experiment scalars
pub fn validate_parameters(
    experiment: &str,
    cell_concentration: f64,
    dilution: f64,
) -> IngestResult<()> {
    if !(dilution > 0.0) {
        return Err(IngestError::InvalidExperimentParameter {
            experiment: experiment.to_string(),
            parameter: DILUTION_KEY,
            value: dilution,
        });
    }
    if !(cell_concentration > 0.0) {
        return Err(IngestError::InvalidExperimentParameter {
            experiment: experiment.to_string(),
            parameter: CELL_CONCENTRATION_KEY,
            value: cell_concentration,
        });
    }
    Ok(())
}

/// Column positions resolved from the header row
struct Columns {
    kind: usize,
    value: usize,
    unit: Option<usize>,
}

impl Columns {
    fn from_header(header: &StringRecord, filename: &str) -> IngestResult<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|cell| cell.trim().eq_ignore_ascii_case(name))
        };

        let kind = find("type").ok_or_else(|| IngestError::MalformedExperimentFile {
            file: filename.to_string(),
            column: "type",
        })?;
        let value = find("value").ok_or_else(|| IngestError::MalformedExperimentFile {
            file: filename.to_string(),
            column: "value",
        })?;

        Ok(Self {
            kind,
            value,
            unit: find("units"),
        })
    }
}

/// Parse dosing sheet text.
///
/// Blank and non-numeric rows are tolerated. A sheet that never sets
/// `cell concentration` or `dilution` fails with
/// [`IngestError::MissingExperimentParameter`].
pub fn parse_experiment_csv(text: &str, filename: &str) -> IngestResult<ParsedExperiment> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns = Columns::from_header(reader.headers()?, filename)?;

    let mut cell_concentration = None;
    let mut dilution = None;
    let mut doses = Vec::new();
    let mut skipped_rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let kind = record.get(columns.kind).map(str::trim).unwrap_or("");
        let value_text = record.get(columns.value).map(str::trim).unwrap_or("");

        if kind.is_empty() || value_text.is_empty() {
            continue;
        }

        let value = match parse_finite(value_text) {
            Some(v) => v,
            None => {
                warn!(
                    file = filename,
                    row_type = kind,
                    value = value_text,
                    "Skipping row with non-numeric value"
                );
                skipped_rows.push(kind.to_string());
                continue;
            }
        };

        if kind.eq_ignore_ascii_case(CELL_CONCENTRATION_KEY) {
            cell_concentration = Some(value);
        } else if kind.eq_ignore_ascii_case(DILUTION_KEY) {
            dilution = Some(value);
        } else {
            let unit = columns
                .unit
                .and_then(|idx| record.get(idx))
                .map(str::trim)
                .unwrap_or("");
            doses.push(CandidateDose {
                reagent_name: kind.to_string(),
                value,
                unit: unit.to_string(),
            });
        }
    }

    let missing = |parameter| IngestError::MissingExperimentParameter {
        file: filename.to_string(),
        parameter,
    };

    Ok(ParsedExperiment {
        cell_concentration: cell_concentration.ok_or_else(|| missing(CELL_CONCENTRATION_KEY))?,
        dilution: dilution.ok_or_else(|| missing(DILUTION_KEY))?,
        doses,
        skipped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "type,value,Units\n\
        cell concentration,5.0,\n\
        dilution,10,\n\
        Glucose,2.5,g/L\n\
        NaCl, 0.5 , M \n";

    #[test]
    fn test_parses_scalars_and_doses() {
        let parsed = parse_experiment_csv(SHEET, "exp 1.csv").unwrap();

        assert_eq!(parsed.cell_concentration, 5.0);
        assert_eq!(parsed.dilution, 10.0);
        assert_eq!(
            parsed.doses,
            vec![
                CandidateDose {
                    reagent_name: "Glucose".to_string(),
                    value: 2.5,
                    unit: "g/L".to_string(),
                },
                CandidateDose {
                    reagent_name: "NaCl".to_string(),
                    value: 0.5,
                    unit: "M".to_string(),
                },
            ]
        );
        assert!(parsed.skipped_rows.is_empty());
    }

    #[test]
    fn test_reserved_keys_match_case_insensitively() {
        let text = "type,value,Units\n  Cell Concentration ,4,\nDILUTION,2,\n";
        let parsed = parse_experiment_csv(text, "exp 2.csv").unwrap();
        assert_eq!(parsed.cell_concentration, 4.0);
        assert_eq!(parsed.dilution, 2.0);
        assert!(parsed.doses.is_empty());
    }

    #[test]
    fn test_last_occurrence_wins() {
        let text = "type,value,Units\ncell concentration,1,\ndilution,2,\ncell concentration,3,\n";
        let parsed = parse_experiment_csv(text, "exp 3.csv").unwrap();
        assert_eq!(parsed.cell_concentration, 3.0);
    }

    #[test]
    fn test_blank_and_non_numeric_rows_are_skipped() {
        let text = "type,value,Units\n\
            cell concentration,5,\n\
            dilution,2,\n\
            ,,\n\
            Yeast extract,,g/L\n\
            Peptone,lots,g/L\n\
            Tryptone,1.5,g/L\n";
        let parsed = parse_experiment_csv(text, "exp 4.csv").unwrap();

        assert_eq!(parsed.doses.len(), 1);
        assert_eq!(parsed.doses[0].reagent_name, "Tryptone");
        assert_eq!(parsed.skipped_rows, vec!["Peptone".to_string()]);
    }

    #[test]
    fn test_units_column_is_optional() {
        let text = "type,value\ncell concentration,5\ndilution,2\nGlucose,1\n";
        let parsed = parse_experiment_csv(text, "exp 5.csv").unwrap();
        assert_eq!(parsed.doses[0].unit, "");
    }

    #[test]
    fn test_missing_scalars_are_fatal() {
        let no_dilution = "type,value,Units\ncell concentration,5,\nGlucose,1,g/L\n";
        match parse_experiment_csv(no_dilution, "exp 6.csv") {
            Err(IngestError::MissingExperimentParameter { parameter, .. }) => {
                assert_eq!(parameter, DILUTION_KEY)
            }
            other => panic!("unexpected result: {:?}", other),
        }

        // A non-numeric mandatory row counts as missing
        let bad_concentration = "type,value,Units\ncell concentration,n/a,\ndilution,2,\n";
        match parse_experiment_csv(bad_concentration, "exp 7.csv") {
            Err(IngestError::MissingExperimentParameter { parameter, .. }) => {
                assert_eq!(parameter, CELL_CONCENTRATION_KEY)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_header_column_is_fatal() {
        assert!(matches!(
            parse_experiment_csv("name,amount\nGlucose,1\n", "exp 8.csv"),
            Err(IngestError::MalformedExperimentFile { column: "type", .. })
        ));
    }

    #[test]
    fn test_zero_dilution_parses_but_fails_validation() {
        let text = "type,value,Units\ncell concentration,5.0,\ndilution,0.0,\n";
        let parsed = parse_experiment_csv(text, "exp 9.csv").unwrap();
        assert_eq!(parsed.dilution, 0.0);

        assert!(matches!(
            parsed.validate("exp 9"),
            Err(IngestError::InvalidExperimentParameter { parameter: DILUTION_KEY, .. })
        ));
    }
}
