//! Plate reading persistence
//!
//! Readings are immutable once written: there is no update path, only bulk
//! insert and bulk delete per plate. "Persisted order" is insertion order
//! (`ORDER BY id`).

use odx_common::db::Reading;
use sqlx::{SqliteConnection, SqlitePool};

const SELECT_READING: &str =
    "SELECT plate_id, row_id, column_id, seconds_time_sample, value FROM plate_readings";

/// Insert readings in order; returns the number of rows written
pub async fn bulk_insert(conn: &mut SqliteConnection, readings: &[Reading]) -> sqlx::Result<u64> {
    let mut inserted = 0;

    for reading in readings {
        sqlx::query(
            r#"
            INSERT INTO plate_readings (plate_id, row_id, column_id, value, seconds_time_sample)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(reading.plate_id)
        .bind(reading.row.to_string())
        .bind(reading.column as i64)
        .bind(reading.value)
        .bind(reading.time_seconds)
        .execute(&mut *conn)
        .await?;

        inserted += 1;
    }

    Ok(inserted)
}

/// All readings of a plate in persisted order
pub async fn list_by_plate(pool: &SqlitePool, plate_id: i64) -> sqlx::Result<Vec<Reading>> {
    sqlx::query_as::<_, Reading>(&format!("{} WHERE plate_id = ? ORDER BY id", SELECT_READING))
        .bind(plate_id)
        .fetch_all(pool)
        .await
}

/// Readings of a plate at one sample time
pub async fn list_by_plate_and_time(
    pool: &SqlitePool,
    plate_id: i64,
    time_seconds: i64,
) -> sqlx::Result<Vec<Reading>> {
    sqlx::query_as::<_, Reading>(&format!(
        "{} WHERE plate_id = ? AND seconds_time_sample = ? ORDER BY id",
        SELECT_READING
    ))
    .bind(plate_id)
    .bind(time_seconds)
    .fetch_all(pool)
    .await
}

/// Time series of one well, ordered by sample time
pub async fn list_by_well(
    pool: &SqlitePool,
    plate_id: i64,
    row: char,
    column: u32,
) -> sqlx::Result<Vec<Reading>> {
    sqlx::query_as::<_, Reading>(&format!(
        "{} WHERE plate_id = ? AND row_id = ? AND column_id = ? ORDER BY seconds_time_sample, id",
        SELECT_READING
    ))
    .bind(plate_id)
    .bind(row.to_string())
    .bind(column as i64)
    .fetch_all(pool)
    .await
}

pub async fn count_by_plate(pool: &SqlitePool, plate_id: i64) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM plate_readings WHERE plate_id = ?")
        .bind(plate_id)
        .fetch_one(pool)
        .await
}

/// Delete every reading of a plate; returns the number of rows removed
pub async fn delete_by_plate(pool: &SqlitePool, plate_id: i64) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM plate_readings WHERE plate_id = ?")
        .bind(plate_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
