//! Database Test Utilities

use anyhow::Result;
use odx_ingest::db::reagents;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// In-memory database with the full schema
pub async fn create_test_pool() -> Result<SqlitePool> {
    Ok(odx_common::db::init_memory_database().await?)
}

/// File-backed database in a temporary directory
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_file_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let pool = odx_ingest::db::init_database_pool(&temp_dir.path().join("odx.db")).await?;
    Ok((temp_dir, pool))
}

/// Insert catalog reagents in order and return their ids
pub async fn seed_catalog(pool: &SqlitePool, names: &[&str]) -> Result<Vec<i64>> {
    let mut ids = Vec::new();
    for name in names {
        let id = reagents::insert_if_absent(pool, name, 1.0, "g/L")
            .await?
            .ok_or_else(|| anyhow::anyhow!("reagent {} already seeded", name))?;
        ids.push(id);
    }
    Ok(ids)
}

/// Row count of a table
pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}
