//! Materialisation of communities into the graph store.
//!
//! Communities become `Community` entities with `BELONGS_TO` edges from
//! their members. A full re-detection runs staged: the new layer is written
//! as a shadow set first, the layer flag is flipped, and only then is the
//! old layer deleted, so readers never observe a half-written layer.

use crate::models::{
    Community, CommunityId, Entity, EntityId, EntityType, PropertyValue, Relation, RelationType,
};
use crate::storage::GraphStore;
use crate::Result;
use std::sync::Arc;

const LAYER_PROPERTY: &str = "layer";
const LAYER_STAGED: &str = "staged";
const LAYER_ACTIVE: &str = "active";

/// Writes detected communities into the graph store.
pub struct CommunityPersister {
    graph: Arc<dyn GraphStore>,
}

impl CommunityPersister {
    /// Creates a persister over a graph store.
    #[must_use]
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    /// Replaces the stored community layer with `communities`.
    ///
    /// Stages the new layer, deletes the previous one, then flips the new
    /// layer active. Returns the number of communities written.
    ///
    /// # Errors
    ///
    /// Returns an error if any store write fails; a failure between stages
    /// leaves either the old or the staged layer intact (writes are
    /// idempotent, so a retry converges).
    pub fn replace_layer(&self, communities: &[Community], generation: u64) -> Result<usize> {
        let previous: Vec<Entity> = self.graph.entities_of_type(EntityType::Community)?;

        // Stage: write the new layer as shadow entities plus member edges.
        for community in communities {
            let entity_id = self.stage_community(community, generation)?;
            for member in &community.member_ids {
                let member_id = EntityId::new(member.clone());
                if self.graph.get_entity(&member_id)?.is_some() {
                    self.graph.upsert_relation(
                        Relation::new(member_id, entity_id.clone(), RelationType::BelongsTo)
                            .with_confidence(1.0),
                    )?;
                }
            }
        }

        // Delete the old layer; cascades through its BELONGS_TO edges.
        for old in &previous {
            self.graph.delete_entity(&old.id)?;
        }

        // Flip: overwrite the layer flag at higher confidence.
        for community in communities {
            let name = Self::node_name(&community.id, generation);
            let flip = Self::community_entity(community, &name, generation)
                .with_property(LAYER_PROPERTY, LAYER_ACTIVE)
                .with_confidence(1.0);
            self.graph.upsert_entity(flip)?;
        }

        Ok(communities.len())
    }

    /// Loads the active community layer back out of the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn load_layer(&self) -> Result<Vec<Community>> {
        let entities = self.graph.entities_of_type(EntityType::Community)?;
        let mut communities = Vec::new();
        for entity in entities {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let level = entity
                .properties
                .get("level")
                .and_then(PropertyValue::as_number)
                .map_or(0, |n| n.max(0.0) as u32);
            let members = self.graph.relations_of(&entity.id)?;
            let member_ids: Vec<String> = members
                .iter()
                .filter(|r| r.relation_type == RelationType::BelongsTo && r.target_id == entity.id)
                .map(|r| r.source_id.as_str().to_string())
                .collect();
            let mut community = Community::new(
                CommunityId::new(entity.name.clone()),
                level,
                member_ids,
            );
            community.summary = entity
                .properties
                .get("summary")
                .and_then(|v| v.as_text().map(ToString::to_string));
            if let Some(PropertyValue::List(keywords)) = entity.properties.get("keywords") {
                community.keywords = keywords.clone();
            }
            communities.push(community);
        }
        communities.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(communities)
    }

    fn stage_community(&self, community: &Community, generation: u64) -> Result<EntityId> {
        let name = Self::node_name(&community.id, generation);
        let staged = Self::community_entity(community, &name, generation)
            .with_property(LAYER_PROPERTY, LAYER_STAGED)
            .with_confidence(0.9);
        self.graph.upsert_entity(staged)
    }

    fn community_entity(community: &Community, name: &str, generation: u64) -> Entity {
        #[allow(clippy::cast_precision_loss)]
        let mut entity = Entity::new(EntityType::Community, name)
            .with_property("level", f64::from(community.level))
            .with_property("generation", generation as f64)
            .with_property("member_count", community.member_count() as f64);
        if let Some(summary) = &community.summary {
            entity = entity.with_property("summary", summary.clone());
        }
        if !community.keywords.is_empty() {
            entity.properties.insert(
                "keywords".to_string(),
                PropertyValue::List(community.keywords.clone()),
            );
        }
        entity
    }

    fn node_name(id: &CommunityId, generation: u64) -> String {
        format!("g{generation} {id}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::InMemoryGraphStore;

    fn seeded_graph() -> Arc<InMemoryGraphStore> {
        let graph = Arc::new(InMemoryGraphStore::new());
        for name in ["A", "B", "C"] {
            graph
                .upsert_entity(
                    Entity::new(EntityType::Concept, name)
                        .with_id(EntityId::new(name.to_lowercase())),
                )
                .unwrap();
        }
        graph
    }

    fn community(members: &[&str]) -> Community {
        Community::new(
            CommunityId::for_level(0, 0),
            0,
            members.iter().map(ToString::to_string).collect(),
        )
    }

    #[test]
    fn test_replace_layer_materialises_membership() {
        let graph = seeded_graph();
        let persister = CommunityPersister::new(Arc::clone(&graph) as Arc<dyn GraphStore>);
        let written = persister
            .replace_layer(&[community(&["a", "b"])], 1)
            .unwrap();
        assert_eq!(written, 1);

        let loaded = persister.load_layer().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].member_count(), 2);
        assert!(loaded[0].contains("a"));
    }

    #[test]
    fn test_replace_layer_swaps_old_layer() {
        let graph = seeded_graph();
        let persister = CommunityPersister::new(Arc::clone(&graph) as Arc<dyn GraphStore>);
        persister
            .replace_layer(&[community(&["a", "b"])], 1)
            .unwrap();
        persister
            .replace_layer(&[community(&["a", "b", "c"])], 2)
            .unwrap();

        let loaded = persister.load_layer().unwrap();
        assert_eq!(loaded.len(), 1, "old layer must be gone");
        assert_eq!(loaded[0].member_count(), 3);
        assert_eq!(
            graph.stats().unwrap().community_count,
            1,
            "exactly one community entity remains"
        );
    }
}
