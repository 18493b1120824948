//! Multi-hop paths through the knowledge graph.

use crate::models::entity::{Entity, EntityId};
use crate::models::relation::Relation;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A simple path: alternating entities and relations.
///
/// Invariant: `entities.len() == relations.len() + 1` and no entity appears
/// twice (simple paths only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPath {
    /// Entities along the path, in order.
    pub entities: Vec<Entity>,
    /// Relations connecting consecutive entities.
    pub relations: Vec<Relation>,
    /// Number of relations.
    pub hops: usize,
    /// Path score in [0, 1]; see the path finder for the public formula.
    pub score: f32,
}

impl GraphPath {
    /// Creates a path from its parts, computing the hop count.
    #[must_use]
    pub fn new(entities: Vec<Entity>, relations: Vec<Relation>) -> Self {
        let hops = relations.len();
        Self {
            entities,
            relations,
            hops,
            score: 0.0,
        }
    }

    /// A zero-hop path consisting of a single entity.
    #[must_use]
    pub fn single(entity: Entity) -> Self {
        Self {
            entities: vec![entity],
            relations: Vec::new(),
            hops: 0,
            score: 1.0,
        }
    }

    /// Whether the path visits any entity twice.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        let mut seen = HashSet::new();
        self.entities.iter().all(|e| seen.insert(&e.id))
    }

    /// Whether the path touches the given entity.
    #[must_use]
    pub fn touches(&self, entity_id: &EntityId) -> bool {
        self.entities.iter().any(|e| &e.id == entity_id)
    }

    /// The ordered entity-ID sequence, used for deterministic tie-breaking.
    #[must_use]
    pub fn id_sequence(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.id.as_str()).collect()
    }

    /// First entity of the path, if non-empty.
    #[must_use]
    pub fn start(&self) -> Option<&Entity> {
        self.entities.first()
    }

    /// Last entity of the path, if non-empty.
    #[must_use]
    pub fn end(&self) -> Option<&Entity> {
        self.entities.last()
    }
}

/// The result of a path-finding request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathResult {
    /// Paths ordered by descending score.
    pub paths: Vec<GraphPath>,
    /// Whether the enumeration budget was exhausted before completion.
    pub truncated: bool,
    /// Time spent enumerating, in milliseconds.
    pub elapsed_ms: u64,
}

impl PathResult {
    /// The best-scoring path, if any.
    #[must_use]
    pub fn best(&self) -> Option<&GraphPath> {
        self.paths.first()
    }

    /// Whether any path was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::entity::EntityType;
    use crate::models::relation::RelationType;

    fn entity(id: &str) -> Entity {
        Entity::new(EntityType::Concept, id).with_id(EntityId::new(id))
    }

    #[test]
    fn test_simple_path_detection() {
        let path = GraphPath::new(
            vec![entity("a"), entity("b")],
            vec![Relation::new(
                EntityId::new("a"),
                EntityId::new("b"),
                RelationType::Cites,
            )],
        );
        assert!(path.is_simple());
        assert_eq!(path.hops, 1);

        let cyclic = GraphPath::new(
            vec![entity("a"), entity("b"), entity("a")],
            vec![
                Relation::new(EntityId::new("a"), EntityId::new("b"), RelationType::Cites),
                Relation::new(EntityId::new("b"), EntityId::new("a"), RelationType::Cites),
            ],
        );
        assert!(!cyclic.is_simple());
    }

    #[test]
    fn test_single_path_has_zero_hops() {
        let path = GraphPath::single(entity("a"));
        assert_eq!(path.hops, 0);
        assert!(path.is_simple());
        assert_eq!(path.start().map(|e| e.id.as_str()), Some("a"));
        assert_eq!(path.end().map(|e| e.id.as_str()), Some("a"));
    }

    #[test]
    fn test_touches() {
        let path = GraphPath::single(entity("a"));
        assert!(path.touches(&EntityId::new("a")));
        assert!(!path.touches(&EntityId::new("b")));
    }
}
