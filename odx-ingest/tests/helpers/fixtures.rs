//! CSV fixtures

use std::path::{Path, PathBuf};

/// Two wells, two time points
pub const PLATE_7: &str = ",A1,A2\n0,0.1,0.2\n30,0.15,0.25\n";

/// Dosing sheet with three catalog reagents and one unknown name
pub const SHEET_EXP_1: &str = "type,value,Units\n\
    cell concentration,5.0,\n\
    dilution,10,\n\
    Tryptone,1.5,g/L\n\
    Glucose,2.5,g/L\n\
    Unobtainium,9,mg\n\
    NaCl,0.5,M\n";

pub fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
