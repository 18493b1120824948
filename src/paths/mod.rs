//! Multi-hop path reasoner: finder, cache, explainer.

pub mod cache;
pub mod explain;
pub mod finder;

pub use cache::{PathCache, PathCacheConfig};
pub use explain::{
    ExplainerOptions, KeyRelation, Locale, PathExplainer, PathExplanation, relation_phrase,
};
pub use finder::{
    EntityRef, MAX_HOPS_CAP, PathFinder, PathFinderOptions, PathQuery, score_path, sort_paths,
};

use crate::models::{EntityId, PathResult};
use crate::Result;

/// Facade wiring the finder through the cache, with explanation attached.
pub struct PathReasoner {
    finder: PathFinder,
    cache: PathCache,
    explainer: PathExplainer,
}

impl PathReasoner {
    /// Creates a reasoner.
    #[must_use]
    pub fn new(finder: PathFinder, cache: PathCache, explainer: PathExplainer) -> Self {
        Self {
            finder,
            cache,
            explainer,
        }
    }

    /// Finds paths, serving structurally-equal cached results when fresh.
    ///
    /// # Errors
    ///
    /// See [`PathFinder::find_paths`].
    pub fn find_paths(&self, query: &PathQuery) -> Result<PathResult> {
        if let Some(cached) = self.cache.get(query) {
            return Ok(cached);
        }
        let result = self.finder.find_paths(query)?;
        self.cache.put(query, result.clone());
        Ok(result)
    }

    /// Explains every path of a result.
    #[must_use]
    pub fn explain(&self, result: &PathResult) -> Vec<explain::PathExplanation> {
        result.paths.iter().map(|p| self.explainer.explain(p)).collect()
    }

    /// Drops cache entries touching an entity. Call after graph mutations.
    pub fn invalidate(&self, entity_id: &EntityId) -> usize {
        self.cache.invalidate(entity_id)
    }

    /// Cache hit rate in [0, 1].
    #[must_use]
    pub fn cache_hit_rate(&self) -> f64 {
        self.cache.hit_rate()
    }

    /// The underlying finder, for derivative queries.
    #[must_use]
    pub const fn finder(&self) -> &PathFinder {
        &self.finder
    }
}
