//! Append-only memo store for expensive external lookups
//!
//! Entries are keyed by `(namespace, key)` and never updated or expired: a
//! stored payload is the answer for that key from then on. Callers
//! canonicalize keys themselves; the store matches them byte for byte.

use odx_common::db::CacheEntry;
use sqlx::SqlitePool;
use std::future::Future;
use thiserror::Error;
use tracing::info;

/// Failure of [`CacheStore::get_or_compute`]
#[derive(Debug, Error)]
pub enum CacheError<E> {
    /// Reading or writing the cache table failed
    #[error("Cache storage error: {0}")]
    Store(#[from] sqlx::Error),

    /// The compute function failed; nothing was stored
    #[error("Lookup failed: {0}")]
    Compute(E),
}

/// Cache view restricted to one namespace
#[derive(Clone)]
pub struct CacheStore {
    pool: SqlitePool,
    namespace: String,
}

impl CacheStore {
    pub fn new(pool: SqlitePool, namespace: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
        }
    }

    /// Stored payload for `key`, if any
    pub async fn get(&self, key: &str) -> sqlx::Result<Option<String>> {
        sqlx::query_scalar("SELECT payload FROM cache_entries WHERE namespace = ? AND cache_key = ?")
            .bind(&self.namespace)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
    }

    /// Full entry for `key`, including its creation time
    pub async fn entry(&self, key: &str) -> sqlx::Result<Option<CacheEntry>> {
        sqlx::query_as::<_, CacheEntry>(
            r#"
            SELECT namespace, cache_key, payload, created_at
            FROM cache_entries
            WHERE namespace = ? AND cache_key = ?
            "#,
        )
        .bind(&self.namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
    }

    /// Number of entries in this namespace
    pub async fn len(&self) -> sqlx::Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries WHERE namespace = ?")
            .bind(&self.namespace)
            .fetch_one(&self.pool)
            .await
    }

    /// Store a payload for a key that must not exist yet.
    ///
    /// A second insert for the same key violates the primary key and fails.
    pub async fn insert(&self, key: &str, payload: &str) -> sqlx::Result<()> {
        sqlx::query("INSERT INTO cache_entries (namespace, cache_key, payload) VALUES (?, ?, ?)")
            .bind(&self.namespace)
            .bind(key)
            .bind(payload)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Return the stored payload for `key`, computing and storing it on a miss.
    ///
    /// `compute` runs only on a miss. Its error is returned unchanged as
    /// [`CacheError::Compute`] and nothing is written, so the next call with
    /// the same key computes again.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, compute: F) -> Result<String, CacheError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(payload) = self.get(key).await? {
            info!(namespace = %self.namespace, key, "Cache hit");
            return Ok(payload);
        }

        info!(namespace = %self.namespace, key, "Cache miss, computing");
        let payload = compute().await.map_err(CacheError::Compute)?;

        self.insert(key, &payload).await?;
        Ok(payload)
    }
}
