//! Graph store trait.
//!
//! The adapter is the only component allowed to know the wire format of the
//! underlying store. Parameterised traversal templates are the sole querying
//! surface; raw query strings never reach a backend from user input.

use crate::Result;
use crate::models::{Entity, EntityId, EntityType, Relation, RelationType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Orientation of a graph projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Edges keep their direction.
    Directed,
    /// Edges are treated as symmetric.
    Undirected,
}

/// Specification for a named projection over an entity/relation subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSpec {
    /// Projection name (unique per store).
    pub name: String,
    /// Entity types to include; `None` means all.
    pub entity_types: Option<Vec<EntityType>>,
    /// Relation types to include; `None` means all.
    pub relation_types: Option<Vec<RelationType>>,
    /// Edge orientation.
    pub orientation: Orientation,
}

/// A materialised projection handle for community algorithms.
///
/// Nodes and weighted edges only; weights are edge confidences. For an
/// undirected projection each stored edge appears once with its endpoints
/// in insertion order.
#[derive(Debug, Clone, Default)]
pub struct GraphProjection {
    /// Projection name.
    pub name: String,
    /// Whether edges are symmetric.
    pub undirected: bool,
    /// Node IDs in the projection.
    pub nodes: Vec<EntityId>,
    /// `(source, target, weight)` edges.
    pub edges: Vec<(EntityId, EntityId, f32)>,
}

impl GraphProjection {
    /// Builds an adjacency map over the projection.
    #[must_use]
    pub fn adjacency(&self) -> HashMap<&EntityId, Vec<(&EntityId, f32)>> {
        let mut adj: HashMap<&EntityId, Vec<(&EntityId, f32)>> = HashMap::new();
        for node in &self.nodes {
            adj.entry(node).or_default();
        }
        for (a, b, w) in &self.edges {
            adj.entry(a).or_default().push((b, *w));
            if self.undirected {
                adj.entry(b).or_default().push((a, *w));
            }
        }
        adj
    }
}

/// Entities and relations collected by a neighbourhood traversal.
#[derive(Debug, Clone, Default)]
pub struct TraversalResult {
    /// Entities found, including the start entity.
    pub entities: Vec<Entity>,
    /// Relations traversed.
    pub relations: Vec<Relation>,
}

impl TraversalResult {
    /// Whether the traversal found nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}

/// A single record produced by a traversal template.
pub type TraversalRecord = HashMap<String, serde_json::Value>;

/// Counts describing the stored graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Total entities.
    pub entity_count: usize,
    /// Total relations.
    pub relation_count: usize,
    /// Total materialised communities.
    pub community_count: usize,
}

/// Trait for graph store backends.
///
/// Implementations must be thread-safe (`Send + Sync`) and enforce the
/// `(type, normalized name)` uniqueness invariant on upsert using
/// [`crate::models::normalize_name`].
pub trait GraphStore: Send + Sync {
    /// Inserts an entity or merges it into an existing one.
    ///
    /// A second call with the same `(type, normalized name)` merges
    /// attributes: new keys added, existing keys overwritten only by
    /// strictly higher confidence, provenance unioned. Returns the
    /// persistent ID.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transient`] on connection failure and
    /// [`crate::Error::Conflict`] on constraint violation.
    fn upsert_entity(&self, entity: Entity) -> Result<EntityId>;

    /// Inserts a relation or merges a duplicate `(source, target, type)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Conflict`] if either endpoint is missing.
    fn upsert_relation(&self, relation: Relation) -> Result<()>;

    /// Fetches an entity by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>>;

    /// Finds an entity by `(type, name)` under normalization.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn find_by_type_name(&self, entity_type: EntityType, name: &str) -> Result<Option<Entity>>;

    /// Collects the neighbourhood of an entity up to `depth` hops.
    ///
    /// # Errors
    ///
    /// Returns an error if the traversal fails.
    fn neighbours(
        &self,
        id: &EntityId,
        depth: usize,
        relation_filter: Option<&[RelationType]>,
    ) -> Result<TraversalResult>;

    /// Returns every relation touching an entity (either direction).
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn relations_of(&self, id: &EntityId) -> Result<Vec<Relation>>;

    /// Runs a registered traversal template with named parameters.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] for an unknown template ID.
    fn run_template(
        &self,
        template_id: &str,
        params: &HashMap<String, String>,
    ) -> Result<Vec<TraversalRecord>>;

    /// Registers a named projection.
    ///
    /// # Errors
    ///
    /// Returns an error if a projection with the same name exists.
    fn create_projection(&self, spec: ProjectionSpec) -> Result<()>;

    /// Materialises a previously created projection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] for an unknown projection.
    fn projection(&self, name: &str) -> Result<GraphProjection>;

    /// Drops a named projection.
    ///
    /// # Errors
    ///
    /// Returns an error if the drop fails.
    fn drop_projection(&self, name: &str) -> Result<bool>;

    /// Deletes an entity, cascading through its relations.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_entity(&self, id: &EntityId) -> Result<bool>;

    /// Returns all entities. Intended for export and analytics.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn all_entities(&self) -> Result<Vec<Entity>>;

    /// Returns all relations.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn all_relations(&self) -> Result<Vec<Relation>>;

    /// Returns all entities of a given type.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn entities_of_type(&self, entity_type: EntityType) -> Result<Vec<Entity>>;

    /// Returns counts for the stored graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn stats(&self) -> Result<GraphStats>;

    /// Removes everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the clear fails.
    fn clear(&self) -> Result<()>;
}
