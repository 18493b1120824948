//! Path result cache.
//!
//! LRU + TTL cache keyed by a SHA-256 of the normalized query. Entries are
//! invalidated when an entity they touch changes, so cached hits stay
//! structurally equal to a fresh computation.

use crate::models::{EntityId, PathResult};
use crate::paths::finder::PathQuery;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Cache configuration.
#[derive(Debug, Clone, Copy)]
pub struct PathCacheConfig {
    /// Entry time-to-live.
    pub ttl: Duration,
    /// Maximum cached queries.
    pub max_size: usize,
}

impl Default for PathCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_size: 500,
        }
    }
}

struct CachedEntry {
    result: PathResult,
    inserted_at: Instant,
}

/// LRU + TTL cache for [`PathResult`]s.
pub struct PathCache {
    entries: Mutex<LruCache<String, CachedEntry>>,
    config: PathCacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PathCache {
    /// Creates a cache with the given configuration.
    #[must_use]
    pub fn new(config: PathCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_size.max(1))
            .unwrap_or_else(|| NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The cache key for a query: hex SHA-256 of its normalized form.
    #[must_use]
    pub fn key(query: &PathQuery) -> String {
        hex::encode(Sha256::digest(query.normalized().as_bytes()))
    }

    /// Looks up a cached result, respecting TTL.
    #[must_use]
    pub fn get(&self, query: &PathQuery) -> Option<PathResult> {
        let key = Self::key(query);
        let mut entries = self.entries.lock().ok()?;
        if let Some(entry) = entries.get(&key) {
            if entry.inserted_at.elapsed() <= self.config.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("yagokoro_path_cache_hits").increment(1);
                return Some(entry.result.clone());
            }
            entries.pop(&key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("yagokoro_path_cache_misses").increment(1);
        None
    }

    /// Stores a result.
    pub fn put(&self, query: &PathQuery, result: PathResult) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                Self::key(query),
                CachedEntry {
                    result,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// Drops every entry whose paths touch the given entity.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, entity_id: &EntityId) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.result.paths.iter().any(|p| p.touches(entity_id)))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }

    /// Empties the cache without touching the hit counters.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Hit rate over the cache's lifetime, in [0, 1].
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = hits as f64 / total as f64;
        rate
    }

    /// Current entry count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{Entity, EntityType, GraphPath};
    use crate::paths::finder::EntityRef;

    fn query(name: &str) -> PathQuery {
        PathQuery::between(EntityRef::named(name), EntityRef::named("end"), 3)
    }

    fn result_touching(id: &str) -> PathResult {
        PathResult {
            paths: vec![GraphPath::single(
                Entity::new(EntityType::Concept, id).with_id(EntityId::new(id)),
            )],
            truncated: false,
            elapsed_ms: 1,
        }
    }

    #[test]
    fn test_put_get_roundtrip() {
        let cache = PathCache::new(PathCacheConfig::default());
        let q = query("a");
        assert!(cache.get(&q).is_none());
        cache.put(&q, result_touching("a"));
        let hit = cache.get(&q).unwrap();
        assert_eq!(hit.paths.len(), 1);
        assert!(cache.hit_rate() > 0.0);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = PathCache::new(PathCacheConfig {
            ttl: Duration::from_millis(0),
            max_size: 10,
        });
        let q = query("a");
        cache.put(&q, result_touching("a"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&q).is_none());
    }

    #[test]
    fn test_invalidate_by_entity() {
        let cache = PathCache::new(PathCacheConfig::default());
        cache.put(&query("a"), result_touching("a"));
        cache.put(&query("b"), result_touching("b"));

        let removed = cache.invalidate(&EntityId::new("a"));
        assert_eq!(removed, 1);
        assert!(cache.get(&query("a")).is_none());
        assert!(cache.get(&query("b")).is_some());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = PathCache::new(PathCacheConfig {
            ttl: Duration::from_secs(60),
            max_size: 2,
        });
        cache.put(&query("a"), result_touching("a"));
        cache.put(&query("b"), result_touching("b"));
        cache.put(&query("c"), result_touching("c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&query("a")).is_none());
    }

    #[test]
    fn test_hit_rate_counts() {
        let cache = PathCache::new(PathCacheConfig::default());
        let q = query("a");
        cache.get(&q); // miss
        cache.put(&q, result_touching("a"));
        cache.get(&q); // hit
        assert!((cache.hit_rate() - 0.5).abs() < 1e-9);
    }
}
