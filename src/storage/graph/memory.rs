//! In-memory graph store backend.
//!
//! Reference implementation of [`GraphStore`] over `RwLock`-protected maps.
//! It is the mock boundary for tests and the default store for single-process
//! deployments; a wire-protocol backend implements the same trait.

use crate::models::{
    Entity, EntityId, EntityType, Relation, RelationKey, RelationType, normalize_name,
};
use crate::storage::traits::graph::{
    GraphProjection, GraphStats, GraphStore, Orientation, ProjectionSpec, TraversalRecord,
    TraversalResult,
};
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Traversal templates the in-memory backend understands.
///
/// The registry is closed: callers select a template by ID and supply named
/// parameters, never query text.
const TEMPLATE_IDS: &[&str] = &[
    "entity_graph",
    "entities_by_type",
    "community_members",
    "timeline",
];

#[derive(Default)]
struct Inner {
    entities: HashMap<EntityId, Entity>,
    by_type_name: HashMap<(EntityType, String), EntityId>,
    relations: BTreeMap<RelationKey, Relation>,
    adjacency: HashMap<EntityId, BTreeSet<RelationKey>>,
    projections: HashMap<String, ProjectionSpec>,
}

/// In-memory [`GraphStore`] implementation.
#[derive(Default)]
pub struct InMemoryGraphStore {
    inner: RwLock<Inner>,
}

impl InMemoryGraphStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| Error::Fatal("graph store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| Error::Fatal("graph store lock poisoned".to_string()))
    }

    fn template_entity_graph(
        inner: &Inner,
        params: &HashMap<String, String>,
    ) -> Result<Vec<TraversalRecord>> {
        let entity_id = params
            .get("entity_id")
            .ok_or_else(|| Error::Validation {
                field: "entity_id".to_string(),
                message: "required by template 'entity_graph'".to_string(),
            })?;
        let id = EntityId::new(entity_id.clone());
        let mut records = Vec::new();
        if let Some(keys) = inner.adjacency.get(&id) {
            for key in keys {
                if let Some(rel) = inner.relations.get(key) {
                    let mut record = TraversalRecord::new();
                    record.insert("source".to_string(), rel.source_id.as_str().into());
                    record.insert("target".to_string(), rel.target_id.as_str().into());
                    record.insert(
                        "relation".to_string(),
                        rel.relation_type.as_str().into(),
                    );
                    record.insert("confidence".to_string(), f64::from(rel.confidence).into());
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    fn template_entities_by_type(
        inner: &Inner,
        params: &HashMap<String, String>,
    ) -> Result<Vec<TraversalRecord>> {
        let type_str = params.get("type").ok_or_else(|| Error::Validation {
            field: "type".to_string(),
            message: "required by template 'entities_by_type'".to_string(),
        })?;
        let entity_type = EntityType::parse(type_str).ok_or_else(|| Error::Validation {
            field: "type".to_string(),
            message: format!("unknown entity type: {type_str}"),
        })?;
        let mut records: Vec<TraversalRecord> = inner
            .entities
            .values()
            .filter(|e| e.entity_type == entity_type)
            .map(|e| {
                let mut record = TraversalRecord::new();
                record.insert("id".to_string(), e.id.as_str().into());
                record.insert("name".to_string(), e.name.as_str().into());
                record
            })
            .collect();
        records.sort_by(|a, b| {
            a.get("id")
                .and_then(serde_json::Value::as_str)
                .cmp(&b.get("id").and_then(serde_json::Value::as_str))
        });
        Ok(records)
    }

    fn template_community_members(
        inner: &Inner,
        params: &HashMap<String, String>,
    ) -> Result<Vec<TraversalRecord>> {
        let community_id = params
            .get("community_id")
            .ok_or_else(|| Error::Validation {
                field: "community_id".to_string(),
                message: "required by template 'community_members'".to_string(),
            })?;
        let target = EntityId::new(community_id.clone());
        let mut records = Vec::new();
        for rel in inner.relations.values() {
            if rel.relation_type == RelationType::BelongsTo && rel.target_id == target {
                if let Some(member) = inner.entities.get(&rel.source_id) {
                    let mut record = TraversalRecord::new();
                    record.insert("id".to_string(), member.id.as_str().into());
                    record.insert("name".to_string(), member.name.as_str().into());
                    record.insert("type".to_string(), member.entity_type.as_str().into());
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    fn template_timeline(inner: &Inner) -> Vec<TraversalRecord> {
        let mut dated: Vec<(&Entity, i32)> = inner
            .entities
            .values()
            .filter_map(|e| e.year().map(|y| (e, y)))
            .collect();
        dated.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.id.cmp(&b.0.id)));
        dated
            .into_iter()
            .map(|(e, year)| {
                let mut record = TraversalRecord::new();
                record.insert("id".to_string(), e.id.as_str().into());
                record.insert("name".to_string(), e.name.as_str().into());
                record.insert("year".to_string(), year.into());
                record
            })
            .collect()
    }
}

impl GraphStore for InMemoryGraphStore {
    fn upsert_entity(&self, entity: Entity) -> Result<EntityId> {
        let mut inner = self.write()?;
        let key = (entity.entity_type, normalize_name(&entity.name));
        if let Some(existing_id) = inner.by_type_name.get(&key).cloned() {
            let existing = inner
                .entities
                .get_mut(&existing_id)
                .ok_or_else(|| Error::Conflict {
                    diagnostic: format!("name index points at missing entity {existing_id}"),
                })?;
            existing.merge_from(&entity);
            return Ok(existing_id);
        }
        let id = entity.id.clone();
        inner.by_type_name.insert(key, id.clone());
        inner.adjacency.entry(id.clone()).or_default();
        inner.entities.insert(id.clone(), entity);
        Ok(id)
    }

    fn upsert_relation(&self, relation: Relation) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.entities.contains_key(&relation.source_id) {
            return Err(Error::Conflict {
                diagnostic: format!("relation source {} does not exist", relation.source_id),
            });
        }
        if !inner.entities.contains_key(&relation.target_id) {
            return Err(Error::Conflict {
                diagnostic: format!("relation target {} does not exist", relation.target_id),
            });
        }
        let key = relation.key();
        inner
            .adjacency
            .entry(relation.source_id.clone())
            .or_default()
            .insert(key.clone());
        inner
            .adjacency
            .entry(relation.target_id.clone())
            .or_default()
            .insert(key.clone());
        match inner.relations.get_mut(&key) {
            Some(existing) => existing.merge_from(&relation),
            None => {
                inner.relations.insert(key, relation);
            },
        }
        Ok(())
    }

    fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>> {
        Ok(self.read()?.entities.get(id).cloned())
    }

    fn find_by_type_name(&self, entity_type: EntityType, name: &str) -> Result<Option<Entity>> {
        let inner = self.read()?;
        let key = (entity_type, normalize_name(name));
        Ok(inner
            .by_type_name
            .get(&key)
            .and_then(|id| inner.entities.get(id))
            .cloned())
    }

    fn neighbours(
        &self,
        id: &EntityId,
        depth: usize,
        relation_filter: Option<&[RelationType]>,
    ) -> Result<TraversalResult> {
        let inner = self.read()?;
        let mut result = TraversalResult::default();
        let Some(start) = inner.entities.get(id) else {
            return Ok(result);
        };
        result.entities.push(start.clone());

        let mut visited: HashSet<EntityId> = HashSet::from([id.clone()]);
        let mut seen_edges: HashSet<RelationKey> = HashSet::new();
        let mut frontier: VecDeque<(EntityId, usize)> = VecDeque::from([(id.clone(), 0)]);

        while let Some((current, dist)) = frontier.pop_front() {
            if dist >= depth {
                continue;
            }
            let Some(keys) = inner.adjacency.get(&current) else {
                continue;
            };
            for key in keys {
                if let Some(filter) = relation_filter {
                    if !filter.contains(&key.relation_type) {
                        continue;
                    }
                }
                let Some(rel) = inner.relations.get(key) else {
                    continue;
                };
                if seen_edges.insert(key.clone()) {
                    result.relations.push(rel.clone());
                }
                let other = if rel.source_id == current {
                    &rel.target_id
                } else {
                    &rel.source_id
                };
                if visited.insert(other.clone()) {
                    if let Some(entity) = inner.entities.get(other) {
                        result.entities.push(entity.clone());
                    }
                    frontier.push_back((other.clone(), dist + 1));
                }
            }
        }
        Ok(result)
    }

    fn relations_of(&self, id: &EntityId) -> Result<Vec<Relation>> {
        let inner = self.read()?;
        let Some(keys) = inner.adjacency.get(id) else {
            return Ok(Vec::new());
        };
        Ok(keys
            .iter()
            .filter_map(|k| inner.relations.get(k).cloned())
            .collect())
    }

    fn run_template(
        &self,
        template_id: &str,
        params: &HashMap<String, String>,
    ) -> Result<Vec<TraversalRecord>> {
        let inner = self.read()?;
        match template_id {
            "entity_graph" => Self::template_entity_graph(&inner, params),
            "entities_by_type" => Self::template_entities_by_type(&inner, params),
            "community_members" => Self::template_community_members(&inner, params),
            "timeline" => Ok(Self::template_timeline(&inner)),
            _ => Err(Error::NotFound {
                resource: format!(
                    "traversal template '{template_id}' (known: {})",
                    TEMPLATE_IDS.join(", ")
                ),
            }),
        }
    }

    fn create_projection(&self, spec: ProjectionSpec) -> Result<()> {
        let mut inner = self.write()?;
        if inner.projections.contains_key(&spec.name) {
            return Err(Error::Conflict {
                diagnostic: format!("projection '{}' already exists", spec.name),
            });
        }
        inner.projections.insert(spec.name.clone(), spec);
        Ok(())
    }

    fn projection(&self, name: &str) -> Result<GraphProjection> {
        let inner = self.read()?;
        let spec = inner.projections.get(name).ok_or_else(|| Error::NotFound {
            resource: format!("projection '{name}'"),
        })?;

        let node_ids: BTreeSet<EntityId> = inner
            .entities
            .values()
            .filter(|e| {
                spec.entity_types
                    .as_ref()
                    .is_none_or(|types| types.contains(&e.entity_type))
            })
            .map(|e| e.id.clone())
            .collect();

        let edges: Vec<(EntityId, EntityId, f32)> = inner
            .relations
            .values()
            .filter(|r| {
                spec.relation_types
                    .as_ref()
                    .is_none_or(|types| types.contains(&r.relation_type))
                    && node_ids.contains(&r.source_id)
                    && node_ids.contains(&r.target_id)
            })
            .map(|r| (r.source_id.clone(), r.target_id.clone(), r.confidence))
            .collect();

        Ok(GraphProjection {
            name: name.to_string(),
            undirected: spec.orientation == Orientation::Undirected,
            nodes: node_ids.into_iter().collect(),
            edges,
        })
    }

    fn drop_projection(&self, name: &str) -> Result<bool> {
        Ok(self.write()?.projections.remove(name).is_some())
    }

    fn delete_entity(&self, id: &EntityId) -> Result<bool> {
        let mut inner = self.write()?;
        let Some(entity) = inner.entities.remove(id) else {
            return Ok(false);
        };
        let key = (entity.entity_type, normalize_name(&entity.name));
        inner.by_type_name.remove(&key);

        // Cascade: remove every relation touching this entity.
        if let Some(keys) = inner.adjacency.remove(id) {
            for rel_key in keys {
                inner.relations.remove(&rel_key);
                let other = if rel_key.source_id == *id {
                    rel_key.target_id.clone()
                } else {
                    rel_key.source_id.clone()
                };
                if let Some(other_keys) = inner.adjacency.get_mut(&other) {
                    other_keys.remove(&rel_key);
                }
            }
        }
        Ok(true)
    }

    fn all_entities(&self) -> Result<Vec<Entity>> {
        let inner = self.read()?;
        let mut entities: Vec<Entity> = inner.entities.values().cloned().collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entities)
    }

    fn all_relations(&self) -> Result<Vec<Relation>> {
        Ok(self.read()?.relations.values().cloned().collect())
    }

    fn entities_of_type(&self, entity_type: EntityType) -> Result<Vec<Entity>> {
        let inner = self.read()?;
        let mut entities: Vec<Entity> = inner
            .entities
            .values()
            .filter(|e| e.entity_type == entity_type)
            .cloned()
            .collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entities)
    }

    fn stats(&self) -> Result<GraphStats> {
        let inner = self.read()?;
        Ok(GraphStats {
            entity_count: inner.entities.len(),
            relation_count: inner.relations.len(),
            community_count: inner
                .entities
                .values()
                .filter(|e| e.entity_type == EntityType::Community)
                .count(),
        })
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.write()?;
        *inner = Inner::default();
        Ok(())
    }
}
