//! Row models shared by the odx crates

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// Catalog reagent
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Reagent {
    pub id: i64,
    pub name: String,
    pub concentration: f64,
    pub unit: String,
}

/// Experiment-level scalar parameters
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Experiment {
    pub id: i64,
    pub cell_concentration: f64,
    pub dilution: f64,
}

/// Persisted dose of one catalog reagent within an experiment
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ReagentValue {
    pub id: i64,
    pub experiment_id: i64,
    pub reagent_id: i64,
    pub value: f64,
    pub unit: String,
}

/// One plate observation: well, time and measured optical density
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub plate_id: i64,
    /// Well row letter, `A`..=`H`
    pub row: char,
    /// Well column, 1-based
    pub column: u32,
    pub time_seconds: i64,
    pub value: f64,
}

impl<'r> FromRow<'r, SqliteRow> for Reading {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let row_id: String = row.try_get("row_id")?;
        let letter = row_id.chars().next().ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "row_id".to_string(),
            source: "empty well row".into(),
        })?;

        let column_id: i64 = row.try_get("column_id")?;
        let column = u32::try_from(column_id).map_err(|e| sqlx::Error::ColumnDecode {
            index: "column_id".to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            plate_id: row.try_get("plate_id")?,
            row: letter,
            column,
            time_seconds: row.try_get("seconds_time_sample")?,
            value: row.try_get("value")?,
        })
    }
}

/// Memoized external lookup result
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct CacheEntry {
    pub namespace: String,
    #[sqlx(rename = "cache_key")]
    pub key: String,
    pub payload: String,
    pub created_at: NaiveDateTime,
}

/// One protocol generation run for a target organism
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ProtocolTracker {
    pub id: i64,
    pub target_organism: String,
    pub created_at: NaiveDateTime,
}

/// One recommended reagent within a protocol run
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ProtocolEntry {
    pub id: i64,
    /// Owning tracker id
    pub protocol_id: i64,
    pub reagent_name: String,
    pub concentration: Option<f64>,
    pub unit: String,
}
