//! Property-based tests for the crate's structural invariants.
//!
//! - `(type, normalized name)` uniqueness in the graph store
//! - name normalization idempotence (shared by store and merge)
//! - every emitted path is simple and within its hop bound
//! - sliding-window rate limiting admits at most the window maximum

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use yagokoro::models::{Entity, EntityId, EntityType, Relation, RelationType, normalize_name};
use yagokoro::paths::{EntityRef, PathFinder, PathFinderOptions, PathQuery};
use yagokoro::security::{InMemoryRateLimitStore, RateLimiter, RateLimiterConfig};
use yagokoro::storage::{GraphStore, InMemoryGraphStore};

proptest! {
    /// Property: upserting arbitrary case/spacing variants of one name
    /// yields exactly one stored entity.
    #[test]
    fn prop_type_name_uniqueness(name in "[a-zA-Z][a-zA-Z0-9 -]{0,24}", variants in 1usize..6) {
        let store = InMemoryGraphStore::new();
        for i in 0..variants {
            let variant = if i % 2 == 0 {
                name.to_uppercase()
            } else {
                format!("  {}  ", name.to_lowercase())
            };
            store
                .upsert_entity(Entity::new(EntityType::Concept, variant))
                .unwrap();
        }
        prop_assert_eq!(store.stats().unwrap().entity_count, 1);
    }

    /// Property: normalization is idempotent and case-insensitive.
    #[test]
    fn prop_normalization_idempotent(s in "\\PC{0,48}") {
        let once = normalize_name(&s);
        let twice = normalize_name(&once);
        prop_assert_eq!(twice.as_str(), once.as_str());
    }

    /// Property: the store and a pre-normalized lookup agree.
    #[test]
    fn prop_store_and_merge_share_normalization(name in "[a-zA-Z][a-zA-Z0-9 ]{0,20}") {
        let store = InMemoryGraphStore::new();
        let id = store
            .upsert_entity(Entity::new(EntityType::Technique, name.clone()))
            .unwrap();
        let found = store
            .find_by_type_name(EntityType::Technique, &normalize_name(&name))
            .unwrap();
        prop_assert_eq!(found.map(|e| e.id), Some(id));
    }

    /// Property: every path emitted over a random graph is simple and
    /// respects the hop bound.
    #[test]
    fn prop_paths_are_simple(
        edges in proptest::collection::vec((0u8..8, 0u8..8), 1..24),
        max_hops in 1usize..5,
    ) {
        let store = Arc::new(InMemoryGraphStore::new());
        let mut nodes: HashSet<u8> = HashSet::new();
        for (a, b) in &edges {
            nodes.insert(*a);
            nodes.insert(*b);
        }
        for node in &nodes {
            store
                .upsert_entity(
                    Entity::new(EntityType::Concept, format!("node {node}"))
                        .with_id(EntityId::new(format!("n{node}"))),
                )
                .unwrap();
        }
        for (a, b) in &edges {
            if a != b {
                store
                    .upsert_relation(Relation::new(
                        EntityId::new(format!("n{a}")),
                        EntityId::new(format!("n{b}")),
                        RelationType::Cites,
                    ))
                    .unwrap();
            }
        }

        let finder = PathFinder::new(
            Arc::clone(&store) as Arc<dyn GraphStore>,
            PathFinderOptions::default(),
        );
        let mut sorted: Vec<u8> = nodes.iter().copied().collect();
        sorted.sort_unstable();
        if let (Some(start), Some(end)) = (sorted.first(), sorted.last()) {
            let result = finder
                .find_paths(&PathQuery::between(
                    EntityRef::Id(EntityId::new(format!("n{start}"))),
                    EntityRef::Id(EntityId::new(format!("n{end}"))),
                    max_hops,
                ))
                .unwrap();
            for path in &result.paths {
                prop_assert!(path.is_simple());
                prop_assert!(path.hops <= max_hops);
                prop_assert!(path.score >= 0.0 && path.score <= 1.0);
            }
        }
    }

    /// Property: within one window at most `max` consumes succeed.
    #[test]
    fn prop_rate_limit_bound(max in 1u32..20, attempts in 1u32..64) {
        let limiter = RateLimiter::new(
            RateLimiterConfig {
                max_requests: max,
                window_ms: 60_000,
                skip_keys: std::collections::HashSet::new(),
            },
            InMemoryRateLimitStore::new(),
        );
        let mut successes = 0u32;
        for i in 0..attempts {
            if limiter.consume_at("key", u64::from(i)).is_ok() {
                successes += 1;
            }
        }
        prop_assert_eq!(successes, attempts.min(max));
    }
}
