//! Recovered protocol persistence
//!
//! A tracker is one recovery run for a target organism; its protocol rows
//! are the recovered `name,concentration,unit` table.

use crate::parsers::text_table::RecoveredRow;
use odx_common::db::{ProtocolEntry, ProtocolTracker};
use sqlx::{SqliteConnection, SqlitePool};

/// Create a tracker and return its id
pub async fn create_tracker(conn: &mut SqliteConnection, target_organism: &str) -> sqlx::Result<i64> {
    let result = sqlx::query("INSERT INTO protocol_trackers (target_organism) VALUES (?)")
        .bind(target_organism)
        .execute(&mut *conn)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Insert recovered rows under a tracker; a `None` concentration stays NULL
pub async fn insert_entries(
    conn: &mut SqliteConnection,
    tracker_id: i64,
    rows: &[RecoveredRow],
) -> sqlx::Result<u64> {
    let mut inserted = 0;

    for row in rows {
        let result = sqlx::query(
            "INSERT INTO protocols (protocol_id, reagent_name, concentration, unit) VALUES (?, ?, ?, ?)",
        )
        .bind(tracker_id)
        .bind(&row.name)
        .bind(row.concentration)
        .bind(&row.unit)
        .execute(&mut *conn)
        .await?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}

pub async fn get_tracker(pool: &SqlitePool, tracker_id: i64) -> sqlx::Result<Option<ProtocolTracker>> {
    sqlx::query_as::<_, ProtocolTracker>(
        "SELECT id, target_organism, created_at FROM protocol_trackers WHERE id = ?",
    )
    .bind(tracker_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_by_tracker(pool: &SqlitePool, tracker_id: i64) -> sqlx::Result<Vec<ProtocolEntry>> {
    sqlx::query_as::<_, ProtocolEntry>(
        "SELECT id, protocol_id, reagent_name, concentration, unit FROM protocols WHERE protocol_id = ? ORDER BY id",
    )
    .bind(tracker_id)
    .fetch_all(pool)
    .await
}

/// Trackers for one organism, newest first
pub async fn trackers_by_organism(
    pool: &SqlitePool,
    target_organism: &str,
) -> sqlx::Result<Vec<ProtocolTracker>> {
    sqlx::query_as::<_, ProtocolTracker>(
        r#"
        SELECT id, target_organism, created_at
        FROM protocol_trackers
        WHERE target_organism = ?
        ORDER BY id DESC
        "#,
    )
    .bind(target_organism)
    .fetch_all(pool)
    .await
}

pub async fn distinct_organisms(pool: &SqlitePool) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar("SELECT DISTINCT target_organism FROM protocol_trackers ORDER BY target_organism")
        .fetch_all(pool)
        .await
}

/// Swap the rows of a tracker for a new table in one transaction
pub async fn replace_for_tracker(
    pool: &SqlitePool,
    tracker_id: i64,
    rows: &[RecoveredRow],
) -> sqlx::Result<u64> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM protocols WHERE protocol_id = ?")
        .bind(tracker_id)
        .execute(&mut *tx)
        .await?;

    let inserted = insert_entries(&mut *tx, tracker_id, rows).await?;

    tx.commit().await?;
    Ok(inserted)
}
