//! Per-run evidence cache.
//!
//! The lexical index is immutable for the lifetime of a run, so the bundle
//! for a query never changes and can be computed once. Criteria that share
//! a description reuse the same bundle.

use moka::future::Cache;
use scorecard_core::{EvidenceBundle, EvidenceSelector, LexicalIndex};

/// Evidence bundles keyed by query text, using moka.
pub struct EvidenceCache {
    cache: Cache<String, EvidenceBundle>,
}

impl EvidenceCache {
    /// Create a cache holding at most `max_entries` bundles.
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_entries).build();
        Self { cache }
    }

    /// Return the cached bundle for `query`, selecting it on first use.
    pub async fn get_or_select(
        &self,
        index: &LexicalIndex,
        selector: &EvidenceSelector,
        query: &str,
    ) -> EvidenceBundle {
        self.cache
            .get_with(query.to_string(), async {
                tracing::trace!(query, "Evidence cache miss");
                selector.select(index, query)
            })
            .await
    }

    pub fn contains(&self, query: &str) -> bool {
        self.cache.contains_key(query)
    }
}

impl std::fmt::Debug for EvidenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
