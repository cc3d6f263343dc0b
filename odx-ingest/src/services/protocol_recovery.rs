//! Protocol recovery
//!
//! Turns generated protocol text into a persisted protocol: one tracker for
//! the target organism plus one row per recovered reagent. Recovery is all
//! or nothing; a table that fails to recover writes nothing.

use crate::db::protocols;
use crate::error::{IngestError, IngestResult};
use crate::parsers::text_table::{recover_table, RecoveredRow};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolRecoveryReport {
    pub tracker_id: i64,
    pub target_organism: String,
    pub rows: Vec<RecoveredRow>,
    pub repaired_lines: usize,
}

/// Recover the reagent table from `text` and persist it for `organism`
pub async fn recover_protocol(
    pool: &SqlitePool,
    text: &str,
    organism: &str,
) -> IngestResult<ProtocolRecoveryReport> {
    let organism = organism.trim();
    if organism.is_empty() {
        return Err(odx_common::Error::InvalidInput("target organism is empty".to_string()).into());
    }

    let table = recover_table(text)?;

    let failed = |source| IngestError::IngestionFailed {
        file: format!("protocol for {}", organism),
        source,
    };

    let mut tx = pool.begin().await.map_err(failed)?;
    let tracker_id = protocols::create_tracker(&mut *tx, organism)
        .await
        .map_err(failed)?;
    protocols::insert_entries(&mut *tx, tracker_id, &table.rows)
        .await
        .map_err(failed)?;
    tx.commit().await.map_err(failed)?;

    info!(
        tracker_id,
        organism,
        rows = table.rows.len(),
        repaired = table.repaired_lines,
        "Protocol recovered"
    );

    Ok(ProtocolRecoveryReport {
        tracker_id,
        target_organism: organism.to_string(),
        rows: table.rows,
        repaired_lines: table.repaired_lines,
    })
}

pub async fn recover_protocol_file(
    pool: &SqlitePool,
    path: &Path,
    organism: &str,
) -> IngestResult<ProtocolRecoveryReport> {
    let text = std::fs::read_to_string(path)?;
    recover_protocol(pool, &text, organism).await
}
