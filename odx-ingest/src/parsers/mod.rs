//! Parsers for instrument exports and generated text
//!
//! All parsers work on in-memory text and never touch storage; the
//! ingestion services in [`crate::services`] own persistence.

pub mod experiment_csv;
pub mod plate_csv;
pub mod text_table;

use once_cell::sync::Lazy;
use regex::Regex;

static PLATE_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"plate_(\d+)").expect("valid plate id pattern"));

static EXPERIMENT_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)exp\s+(\d+)").expect("valid experiment id pattern"));

/// Recover a plate id from a file name such as `plate_7_abs.csv`
pub fn plate_id_from_filename(filename: &str) -> Option<i64> {
    first_number(&PLATE_ID_PATTERN, filename)
}

/// Recover an experiment id from a file name such as
/// `Costs analysis of chemicals - Exp 3.csv`
pub fn experiment_id_from_filename(filename: &str) -> Option<i64> {
    first_number(&EXPERIMENT_ID_PATTERN, filename)
}

fn first_number(pattern: &Regex, text: &str) -> Option<i64> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parse a finite float, rejecting `NaN` and infinities
pub(crate) fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plate_id_from_filename() {
        assert_eq!(plate_id_from_filename("plate_7_abs.csv"), Some(7));
        assert_eq!(plate_id_from_filename("run2/plate_0042.csv"), Some(42));
        assert_eq!(plate_id_from_filename("abs.csv"), None);
        assert_eq!(plate_id_from_filename("plate_abs.csv"), None);
        assert_eq!(plate_id_from_filename("Plate_3.csv"), None);
    }

    #[test]
    fn test_experiment_id_from_filename() {
        assert_eq!(
            experiment_id_from_filename("Costs analysis of chemicals - exp 1.csv"),
            Some(1)
        );
        assert_eq!(experiment_id_from_filename("EXP   12.csv"), Some(12));
        assert_eq!(experiment_id_from_filename("exp12.csv"), None);
        assert_eq!(experiment_id_from_filename("experiment.csv"), None);
    }

    #[test]
    fn test_parse_finite() {
        assert_eq!(parse_finite("0.25"), Some(0.25));
        assert_eq!(parse_finite("1e3"), Some(1000.0));
        assert_eq!(parse_finite("NaN"), None);
        assert_eq!(parse_finite("inf"), None);
        assert_eq!(parse_finite("abc"), None);
    }
}
