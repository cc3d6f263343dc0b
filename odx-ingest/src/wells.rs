//! Plate well identifiers
//!
//! A well is addressed by a row letter `A`..=`H` and a 1-based column
//! number, written together as e.g. `A1` or `H12`. The codec performs no
//! trimming or case folding; callers normalize first.

use crate::error::{IngestError, IngestResult};
use std::fmt;
use std::str::FromStr;

/// Rows of a 96-well plate
pub const PLATE_ROWS: std::ops::RangeInclusive<char> = 'A'..='H';

/// Decoded well position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Well {
    pub row: char,
    pub column: u32,
}

impl Well {
    pub fn new(row: char, column: u32) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Well {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.column)
    }
}

impl FromStr for Well {
    type Err = IngestError;

    fn from_str(s: &str) -> IngestResult<Self> {
        let (row, column) = decode(s)?;
        Ok(Self { row, column })
    }
}

/// Decode `"B7"` into `('B', 7)`.
///
/// The whole input must be one uppercase row letter in `A..=H` followed by
/// one or more ASCII digits.
pub fn decode(text: &str) -> IngestResult<(char, u32)> {
    let invalid = || IngestError::InvalidWellIdentifier(text.to_string());

    let mut chars = text.chars();
    let row = chars.next().filter(|c| PLATE_ROWS.contains(c)).ok_or_else(invalid)?;

    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let column = digits.parse::<u32>().map_err(|_| invalid())?;
    Ok((row, column))
}

/// Encode a row letter and column into well text
pub fn encode(row: char, column: u32) -> String {
    format!("{}{}", row, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_identifiers() {
        assert_eq!(decode("A1").unwrap(), ('A', 1));
        assert_eq!(decode("H12").unwrap(), ('H', 12));
        assert_eq!(decode("C007").unwrap(), ('C', 7));
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        for bad in ["", "A", "I1", "a1", " A1", "A1 ", "A1x", "1A", "AA1", "A-1", "Time"] {
            assert!(
                matches!(decode(bad), Err(IngestError::InvalidWellIdentifier(_))),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_round_trip_over_full_plate() {
        for row in PLATE_ROWS {
            for column in 1..=12 {
                assert_eq!(decode(&encode(row, column)).unwrap(), (row, column));
            }
        }
        assert_eq!(decode(&encode('D', 4096)).unwrap(), ('D', 4096));
    }

    #[test]
    fn test_well_display_and_parse() {
        let well: Well = "E5".parse().unwrap();
        assert_eq!(well, Well::new('E', 5));
        assert_eq!(well.to_string(), "E5");
    }
}
