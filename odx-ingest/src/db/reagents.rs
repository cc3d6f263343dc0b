//! Reagent catalog
//!
//! The catalog is pre-populated (see the `seed-reagents` command) and only
//! read during experiment ingestion: dose names resolve by exact match.

use async_trait::async_trait;
use odx_common::db::Reagent;
use sqlx::SqlitePool;

/// Name lookup seam used by experiment ingestion
#[async_trait]
pub trait ReagentCatalog: Send + Sync {
    /// Exact, case-sensitive name match
    async fn find_reagent_by_name(&self, name: &str) -> sqlx::Result<Option<Reagent>>;
}

/// Catalog backed by the `reagents` table
#[derive(Clone)]
pub struct SqliteReagentCatalog {
    pool: SqlitePool,
}

impl SqliteReagentCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReagentCatalog for SqliteReagentCatalog {
    async fn find_reagent_by_name(&self, name: &str) -> sqlx::Result<Option<Reagent>> {
        get_by_name(&self.pool, name).await
    }
}

pub async fn get_by_name(pool: &SqlitePool, name: &str) -> sqlx::Result<Option<Reagent>> {
    sqlx::query_as::<_, Reagent>("SELECT id, name, concentration, unit FROM reagents WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
}

pub async fn get_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Reagent>> {
    sqlx::query_as::<_, Reagent>("SELECT id, name, concentration, unit FROM reagents WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_all(pool: &SqlitePool) -> sqlx::Result<Vec<Reagent>> {
    sqlx::query_as::<_, Reagent>("SELECT id, name, concentration, unit FROM reagents ORDER BY id")
        .fetch_all(pool)
        .await
}

/// Insert a catalog reagent unless the name already exists.
///
/// Returns the new id, or `None` when the name was already present.
pub async fn insert_if_absent(
    pool: &SqlitePool,
    name: &str,
    concentration: f64,
    unit: &str,
) -> sqlx::Result<Option<i64>> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO reagents (name, concentration, unit) VALUES (?, ?, ?)",
    )
    .bind(name)
    .bind(concentration)
    .bind(unit)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        Ok(None)
    } else {
        Ok(Some(result.last_insert_rowid()))
    }
}
