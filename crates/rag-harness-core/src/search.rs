//! Cosine-similarity search over a [`VectorIndex`] with a FIFO result cache.
//!
//! # Algorithm
//!
//! 1. Embed the query with no sibling statistics.
//! 2. Candidate documents are `doc_ids` when given, otherwise every document
//!    with a non-empty record set, in index order.
//! 3. Score every record of every candidate by cosine similarity and keep
//!    records with `score >= min_score`.
//! 4. Stable-sort descending by score, so ties keep document scan order and
//!    then chunk order.
//! 5. Truncate to `top_k`.
//!
//! # Caching
//!
//! | Event | Effect |
//! |-------|--------|
//! | hit | stored `Arc` returned as is, nothing recomputed |
//! | miss, cache full | oldest *inserted* entry evicted (FIFO, not LRU) |
//! | index mutation | caller invokes [`SearchEngine::invalidate`] |
//!
//! Search never fails: blank queries, unknown document ids, and empty
//! indexes all yield an empty result list.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::index::VectorIndex;
use crate::models::{SearchResult, VectorRecord};

/// Default number of results returned.
pub const DEFAULT_TOP_K: usize = 5;

/// Default minimum cosine score.
pub const DEFAULT_MIN_SCORE: f32 = 0.5;

/// Default maximum number of cached queries.
pub const DEFAULT_CACHE_SIZE: usize = 100;

/// Per-call search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub top_k: usize,
    /// Restrict the scan to these documents.
    pub doc_ids: Option<Vec<String>>,
    pub min_score: f32,
    pub use_cache: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            doc_ids: None,
            min_score: DEFAULT_MIN_SCORE,
            use_cache: true,
        }
    }
}

/// Identity of a cacheable search call.
///
/// Includes the document scope, so a scoped and an unscoped search for the
/// same text are cached separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    top_k: usize,
    min_score_bits: u32,
    doc_ids: Option<Vec<String>>,
}

impl CacheKey {
    pub fn new(query: &str, opts: &SearchOptions) -> Self {
        Self {
            query: query.to_string(),
            top_k: opts.top_k,
            min_score_bits: opts.min_score.to_bits(),
            doc_ids: opts.doc_ids.clone(),
        }
    }
}

/// Bounded first-in-first-out cache of ranked result lists.
#[derive(Debug)]
pub struct QueryCache {
    capacity: usize,
    entries: HashMap<CacheKey, Arc<Vec<SearchResult>>>,
    order: VecDeque<CacheKey>,
}

impl QueryCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<SearchResult>>> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Store `results`, evicting the earliest-inserted entry when full.
    pub fn insert(&mut self, key: CacheKey, results: Arc<Vec<SearchResult>>) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, results);
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, results);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

/// One candidate document handed to [`rank_records`].
pub struct Candidate<'a> {
    pub doc_id: &'a str,
    pub doc_name: &'a str,
    pub records: &'a [VectorRecord],
}

/// Score, filter, sort, and truncate records against a query vector.
///
/// Shared by document search and external-source search so both rank the
/// same way.
pub fn rank_records<'a, I>(
    query_vec: &[f32],
    candidates: I,
    top_k: usize,
    min_score: f32,
) -> Vec<SearchResult>
where
    I: IntoIterator<Item = Candidate<'a>>,
{
    let mut results: Vec<SearchResult> = Vec::new();

    for cand in candidates {
        for record in cand.records {
            let score = cosine_similarity(query_vec, &record.vector);
            if score >= min_score {
                results.push(SearchResult {
                    doc_id: cand.doc_id.to_string(),
                    doc_name: cand.doc_name.to_string(),
                    chunk_id: record.chunk_id.clone(),
                    text: record.text.clone(),
                    score,
                    index: record.index,
                });
            }
        }
    }

    // `sort_by` is stable, which keeps scan order for equal scores.
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(top_k);
    results
}

/// Query embedder plus result cache.
pub struct SearchEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    cache: QueryCache,
}

impl SearchEngine {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, cache_size: usize) -> Self {
        Self {
            embedder,
            cache: QueryCache::new(cache_size),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Drop every cached result. Call after any index mutation.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// Run a search against `index`.
    ///
    /// `doc_name` resolves a document id to its display name; documents it
    /// cannot resolve are skipped.
    pub fn search<F>(
        &mut self,
        index: &VectorIndex,
        doc_name: F,
        query: &str,
        opts: &SearchOptions,
    ) -> Arc<Vec<SearchResult>>
    where
        F: Fn(&str) -> Option<String>,
    {
        if query.trim().is_empty() || opts.top_k == 0 {
            return Arc::new(Vec::new());
        }

        let key = opts.use_cache.then(|| CacheKey::new(query, opts));
        if let Some(hit) = key.as_ref().and_then(|k| self.cache.get(k)) {
            return hit;
        }

        let query_vec = self.embedder.embed(query, None);

        let doc_ids = match &opts.doc_ids {
            Some(ids) => ids.clone(),
            None => index.all_doc_ids(),
        };
        let named: Vec<(String, String)> = doc_ids
            .into_iter()
            .filter_map(|id| doc_name(&id).map(|name| (id, name)))
            .collect();
        let candidates = named.iter().filter_map(|(id, name)| {
            index.get(id).map(|records| Candidate {
                doc_id: id,
                doc_name: name,
                records,
            })
        });

        let results = Arc::new(rank_records(
            &query_vec,
            candidates,
            opts.top_k,
            opts.min_score,
        ));

        if let Some(key) = key {
            self.cache.insert(key, Arc::clone(&results));
        }
        results
    }
}
