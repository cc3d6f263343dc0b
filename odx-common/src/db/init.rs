//! Database initialization
//!
//! Creates the SQLite database on first run and the odx schema with
//! `CREATE TABLE IF NOT EXISTS`, so initialization is idempotent.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Batch ingestion is single-writer; a small pool is plenty
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema.
///
/// The pool holds exactly one connection: every connection to
/// `sqlite::memory:` would otherwise see its own empty database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every odx table (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_reagents_table(pool).await?;
    create_experiments_table(pool).await?;
    create_reagent_values_table(pool).await?;
    create_experiment_feature_slots_table(pool).await?;
    create_plate_readings_table(pool).await?;
    create_cache_entries_table(pool).await?;
    create_protocol_trackers_table(pool).await?;
    create_protocols_table(pool).await?;

    Ok(())
}

/// Create the reagent catalog table
///
/// Names are unique: dose resolution is an exact name lookup.
pub async fn create_reagents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reagents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            concentration REAL NOT NULL DEFAULT 0.0,
            unit TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_experiments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS experiments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cell_concentration REAL NOT NULL,
            dilution REAL NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_reagent_values_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reagent_values (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            experiment_id INTEGER NOT NULL REFERENCES experiments(id) ON DELETE CASCADE,
            reagent_id INTEGER NOT NULL REFERENCES reagents(id),
            value REAL NOT NULL,
            unit TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_reagent_values_experiment ON reagent_values(experiment_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Explicit feature slot assignment per experiment.
///
/// One row per persisted dose; `slot_index` is 1-based and fixes which
/// `feature_N` column the dose lands in.
async fn create_experiment_feature_slots_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS experiment_feature_slots (
            experiment_id INTEGER NOT NULL REFERENCES experiments(id) ON DELETE CASCADE,
            slot_index INTEGER NOT NULL CHECK (slot_index >= 1),
            reagent_value_id INTEGER NOT NULL UNIQUE REFERENCES reagent_values(id) ON DELETE CASCADE,
            reagent_id INTEGER NOT NULL REFERENCES reagents(id),
            PRIMARY KEY (experiment_id, slot_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Plate readings: one row per (well, time) observation.
///
/// No uniqueness on (plate, well, time): bulk ingestion is append-only and
/// duplicate observations in a file are kept.
async fn create_plate_readings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plate_readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            plate_id INTEGER NOT NULL,
            row_id TEXT NOT NULL CHECK (length(row_id) = 1),
            column_id INTEGER NOT NULL,
            value REAL NOT NULL,
            seconds_time_sample INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_plate_readings_plate ON plate_readings(plate_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Append-only memo table for external lookups.
///
/// The primary key makes a second write for the same key fail loudly.
async fn create_cache_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            namespace TEXT NOT NULL,
            cache_key TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (namespace, cache_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_protocol_trackers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS protocol_trackers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            target_organism TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_protocols_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS protocols (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            protocol_id INTEGER NOT NULL REFERENCES protocol_trackers(id) ON DELETE CASCADE,
            reagent_name TEXT NOT NULL,
            concentration REAL,
            unit TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() {
        let pool = init_memory_database().await.unwrap();

        // Second pass must not fail on existing tables
        create_schema(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for expected in [
            "cache_entries",
            "experiment_feature_slots",
            "experiments",
            "plate_readings",
            "protocol_trackers",
            "protocols",
            "reagent_values",
            "reagents",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
        }
    }
}
