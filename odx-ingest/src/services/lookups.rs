//! Cached external lookups
//!
//! Literature retrieval and sequence-similarity searches are slow remote
//! calls. Their results are memoized in a [`CacheStore`] under a canonical
//! key, so the same organism (set) never triggers a second remote call.
//! Transport failures from a source surface unchanged as
//! [`CacheError::Compute`] and leave no entry behind.

use crate::db::cache::{CacheError, CacheStore};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::info;

pub const LITERATURE_NAMESPACE: &str = "literature";
pub const RELATED_ORGANISMS_NAMESPACE: &str = "related_organisms";

/// Related organisms kept after ranking
pub const MAX_RELATED_ORGANISMS: usize = 10;

/// Remote literature retrieval for a set of organisms
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn fetch_literature(&self, organisms: &[String]) -> Result<String, Self::Error>;
}

/// One alignment hit from a remote similarity search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentHit {
    /// Hit description, starting with the genus and species
    pub title: String,
    pub identities: u32,
    pub align_length: u32,
    pub score: f64,
}

impl AlignmentHit {
    /// Identity percentage of the best high-scoring pair
    pub fn identity(&self) -> f64 {
        if self.align_length == 0 {
            return 0.0;
        }
        f64::from(self.identities) / f64::from(self.align_length) * 100.0
    }
}

/// Remote similarity search for one organism
#[async_trait]
pub trait SimilaritySource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn search_similar(&self, organism: &str) -> Result<Vec<AlignmentHit>, Self::Error>;
}

/// Cache key for a set of organisms: order, case, padding and repeats do
/// not matter.
pub fn canonical_organism_set<S: AsRef<str>>(organisms: &[S]) -> String {
    let mut names: Vec<String> = organisms
        .iter()
        .map(|name| name.as_ref().trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect();
    names.sort();
    names.dedup();
    names.join(",")
}

/// Cache key for a single organism
pub fn canonical_organism(organism: &str) -> String {
    organism.trim().to_lowercase()
}

/// Literature for `organisms`, fetched at most once per canonical set
pub async fn cached_literature<L: LiteratureSource>(
    pool: &SqlitePool,
    organisms: &[String],
    source: &L,
) -> Result<String, CacheError<L::Error>> {
    let store = CacheStore::new(pool.clone(), LITERATURE_NAMESPACE);
    let key = canonical_organism_set(organisms);

    store
        .get_or_compute(&key, || source.fetch_literature(organisms))
        .await
}

/// Species most similar to `organism`, best first.
///
/// A non-empty ranking is cached comma-joined; an empty one is returned
/// without being cached so a later call searches again.
pub async fn cached_related_organisms<S: SimilaritySource>(
    pool: &SqlitePool,
    organism: &str,
    source: &S,
) -> Result<Vec<String>, CacheError<S::Error>> {
    let store = CacheStore::new(pool.clone(), RELATED_ORGANISMS_NAMESPACE);
    let key = canonical_organism(organism);

    if let Some(payload) = store.get(&key).await? {
        info!(namespace = RELATED_ORGANISMS_NAMESPACE, key = %key, "Cache hit");
        return Ok(split_payload(&payload));
    }

    info!(namespace = RELATED_ORGANISMS_NAMESPACE, key = %key, "Cache miss, searching");
    let hits = source
        .search_similar(organism)
        .await
        .map_err(CacheError::Compute)?;

    let ranked = rank_related_organisms(&hits, organism);
    if ranked.is_empty() {
        info!(key = %key, "No related organisms found, not caching");
        return Ok(ranked);
    }

    store.insert(&key, &ranked.join(",")).await?;
    Ok(ranked)
}

fn split_payload(payload: &str) -> Vec<String> {
    payload
        .split(',')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Rank alignment hits into distinct related species.
///
/// The species is the first two words of a hit title; the target organism
/// and later hits for an already seen species are skipped. Species are
/// ordered by identity, best first, and unresolved names (`Uncultured ...`,
/// `... sp.`) are dropped before taking the top [`MAX_RELATED_ORGANISMS`].
pub fn rank_related_organisms(hits: &[AlignmentHit], target: &str) -> Vec<String> {
    let target = canonical_organism(target);
    let mut seen = HashSet::new();
    let mut species: Vec<(String, f64)> = Vec::new();

    for hit in hits {
        let words: Vec<&str> = hit.title.split_whitespace().take(2).collect();
        if words.len() < 2 {
            continue;
        }
        let name = words.join(" ");
        if name.to_lowercase() == target || !seen.insert(name.clone()) {
            continue;
        }
        species.push((name, hit.identity()));
    }

    species.sort_by(|a, b| b.1.total_cmp(&a.1));

    species
        .into_iter()
        .map(|(name, _)| name)
        .filter(|name| !is_unresolved_species(name))
        .take(MAX_RELATED_ORGANISMS)
        .collect()
}

fn is_unresolved_species(name: &str) -> bool {
    name.contains("Uncultured") || name.ends_with("sp.") || name.contains(" sp.")
}
