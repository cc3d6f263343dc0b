//! Database access for odx-ingest
//!
//! Reads take the pool; writes that belong to one unit of work take a
//! connection so the caller can run them inside its transaction
//! (`&mut *tx`).

pub mod cache;
pub mod experiments;
pub mod protocols;
pub mod readings;
pub mod reagents;

use odx_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open (or create) the odx database with the full schema
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::debug!("Connecting to database: {}", db_path.display());
    odx_common::db::init_database(db_path).await
}
