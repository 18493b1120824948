//! Bounded-depth path enumeration and scoring.
//!
//! Breadth-first enumeration of simple paths, limited by a total-paths
//! budget. The score formula is public because it affects tie-breaks in
//! cached results:
//!
//! ```text
//! score = (Σ edge confidences / hops) × recency_factor
//! recency_factor = clamp(1 − (current_year − latest_provenance_year) / 10, 0.25, 1.0)
//! ```
//!
//! Paths with no dated provenance use a recency factor of 1.0. Ties break
//! by fewer hops, then by lexicographically smaller entity-ID sequence.

use crate::models::{
    Entity, EntityId, EntityType, GraphPath, PathResult, Relation, RelationType, normalize_name,
};
use crate::storage::GraphStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

/// Hard cap on `max_hops`.
pub const MAX_HOPS_CAP: usize = 6;

/// Years over which the recency factor decays to its floor.
pub const RECENCY_WINDOW_YEARS: f32 = 10.0;

/// Reference to a path endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityRef {
    /// By persistent ID.
    Id(EntityId),
    /// By name, optionally narrowed to a type.
    Named {
        /// Restricting type, if known.
        entity_type: Option<EntityType>,
        /// Entity name (normalized for lookup).
        name: String,
    },
}

impl EntityRef {
    /// Endpoint reference by name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            entity_type: None,
            name: name.into(),
        }
    }

    /// Stable rendering used in cache keys.
    #[must_use]
    pub fn cache_token(&self) -> String {
        match self {
            Self::Id(id) => format!("id:{id}"),
            Self::Named { entity_type, name } => format!(
                "name:{}:{}",
                entity_type.map_or("*", EntityType::as_str),
                normalize_name(name)
            ),
        }
    }
}

/// A path-finding request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathQuery {
    /// Start endpoint; at least one of start/end must be set.
    pub start: Option<EntityRef>,
    /// End endpoint.
    pub end: Option<EntityRef>,
    /// Maximum hops; capped at [`MAX_HOPS_CAP`].
    pub max_hops: usize,
    /// Restrict traversal to these relation types.
    pub relation_types: Option<Vec<RelationType>>,
    /// Required type of the path's start entity. With an explicit `start`
    /// it gates the resolved entity; with only an `end` it filters the
    /// far-side nodes discovered during backwards enumeration.
    pub start_type: Option<EntityType>,
    /// Required type of the path's end entity. With an explicit `end` it
    /// gates the resolved entity; with only a `start` it filters the
    /// far-side nodes discovered during enumeration.
    pub end_type: Option<EntityType>,
}

impl PathQuery {
    /// A start→end query with a hop bound.
    #[must_use]
    pub fn between(start: EntityRef, end: EntityRef, max_hops: usize) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            max_hops,
            relation_types: None,
            start_type: None,
            end_type: None,
        }
    }

    /// Canonical string for cache keying; equal queries render equally.
    #[must_use]
    pub fn normalized(&self) -> String {
        let relations = self.relation_types.as_ref().map_or_else(String::new, |types| {
            let mut names: Vec<&str> = types.iter().map(RelationType::as_str).collect();
            names.sort_unstable();
            names.join(",")
        });
        format!(
            "start={};end={};hops={};rel={};st={};et={}",
            self.start.as_ref().map_or_else(String::new, EntityRef::cache_token),
            self.end.as_ref().map_or_else(String::new, EntityRef::cache_token),
            self.max_hops.min(MAX_HOPS_CAP),
            relations,
            self.start_type.map_or("*", EntityType::as_str),
            self.end_type.map_or("*", EntityType::as_str),
        )
    }
}

/// Options for the path finder.
#[derive(Debug, Clone)]
pub struct PathFinderOptions {
    /// Total enumerated-path budget.
    pub max_paths: usize,
}

impl Default for PathFinderOptions {
    fn default() -> Self {
        Self { max_paths: 100 }
    }
}

/// Multi-hop path finder over the graph store.
pub struct PathFinder {
    graph: Arc<dyn GraphStore>,
    options: PathFinderOptions,
}

impl PathFinder {
    /// Creates a path finder.
    #[must_use]
    pub fn new(graph: Arc<dyn GraphStore>, options: PathFinderOptions) -> Self {
        Self { graph, options }
    }

    /// Finds paths matching the query, best first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when neither endpoint is given and
    /// [`Error::NotFound`] when a named endpoint cannot be resolved.
    pub fn find_paths(&self, query: &PathQuery) -> Result<PathResult> {
        let started = Instant::now();
        let max_hops = query.max_hops.min(MAX_HOPS_CAP);

        let start_entity = query.start.as_ref().map(|r| self.resolve(r)).transpose()?;
        let end_entity = query.end.as_ref().map(|r| self.resolve(r)).transpose()?;

        // Explicit endpoints must carry their declared types, no matter
        // which side they were given on.
        if let (Some(required), Some(entity)) = (query.start_type, start_entity.as_ref()) {
            if entity.entity_type != required {
                return Ok(PathResult::default());
            }
        }
        if let (Some(required), Some(entity)) = (query.end_type, end_entity.as_ref()) {
            if entity.entity_type != required {
                return Ok(PathResult::default());
            }
        }

        // A query with only an end endpoint enumerates backwards from it,
        // so the type filter for the discovered far side is `start_type`
        // (those nodes are the paths' starts). Edge direction is ignored
        // during traversal either way.
        let (anchor_entity, target_entity, terminal_type) =
            if let Some(start) = start_entity.as_ref() {
                (start, end_entity.as_ref(), query.end_type)
            } else if let Some(end) = end_entity.as_ref() {
                (end, None, query.start_type)
            } else {
                return Err(Error::Validation {
                    field: "start".to_string(),
                    message: "at least one of start/end is required".to_string(),
                });
            };

        let mut paths = self.enumerate(
            anchor_entity,
            target_entity,
            max_hops,
            query.relation_types.as_deref(),
            terminal_type,
        )?;
        let truncated = paths.len() >= self.options.max_paths;

        let current_year = current_year();
        for path in &mut paths {
            path.score = score_path(path, current_year);
        }
        sort_paths(&mut paths);

        Ok(PathResult {
            paths,
            truncated,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// The shortest path between two endpoints, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if endpoint resolution fails.
    pub fn find_shortest(
        &self,
        start: &EntityRef,
        end: &EntityRef,
        max_hops: usize,
    ) -> Result<Option<GraphPath>> {
        let result = self.find_paths(&PathQuery::between(start.clone(), end.clone(), max_hops))?;
        Ok(result
            .paths
            .into_iter()
            .min_by(|a, b| a.hops.cmp(&b.hops).then_with(|| {
                a.id_sequence().cmp(&b.id_sequence())
            })))
    }

    /// Whether two endpoints are connected within `max_hops`.
    ///
    /// # Errors
    ///
    /// Returns an error if endpoint resolution fails.
    pub fn are_connected(
        &self,
        start: &EntityRef,
        end: &EntityRef,
        max_hops: usize,
    ) -> Result<bool> {
        Ok(self.find_shortest(start, end, max_hops)?.is_some())
    }

    /// The hop count of the shortest path, if connected.
    ///
    /// # Errors
    ///
    /// Returns an error if endpoint resolution fails.
    pub fn degrees_of_separation(
        &self,
        start: &EntityRef,
        end: &EntityRef,
        max_hops: usize,
    ) -> Result<Option<usize>> {
        Ok(self.find_shortest(start, end, max_hops)?.map(|p| p.hops))
    }

    /// Entities adjacent to both endpoints, excluding the endpoints and
    /// their direct edge.
    ///
    /// # Errors
    ///
    /// Returns an error if endpoint resolution fails.
    pub fn common_connections(&self, a: &EntityRef, b: &EntityRef) -> Result<Vec<Entity>> {
        let entity_a = self.resolve(a)?;
        let entity_b = self.resolve(b)?;
        let hood_a = self.graph.neighbours(&entity_a.id, 1, None)?;
        let hood_b = self.graph.neighbours(&entity_b.id, 1, None)?;

        let ids_b: std::collections::BTreeSet<&EntityId> =
            hood_b.entities.iter().map(|e| &e.id).collect();
        let mut common: Vec<Entity> = hood_a
            .entities
            .into_iter()
            .filter(|e| {
                ids_b.contains(&e.id) && e.id != entity_a.id && e.id != entity_b.id
            })
            .collect();
        common.sort_by(|x, y| x.id.cmp(&y.id));
        Ok(common)
    }

    /// Paths between two names, resolved without a type restriction.
    ///
    /// # Errors
    ///
    /// Returns an error if either name cannot be resolved.
    pub fn find_relation_paths(
        &self,
        name_a: &str,
        name_b: &str,
        max_hops: usize,
        relation_types: Option<Vec<RelationType>>,
    ) -> Result<PathResult> {
        let query = PathQuery {
            start: Some(EntityRef::named(name_a)),
            end: Some(EntityRef::named(name_b)),
            max_hops,
            relation_types,
            start_type: None,
            end_type: None,
        };
        self.find_paths(&query)
    }

    /// Resolves an endpoint reference to a stored entity.
    fn resolve(&self, endpoint: &EntityRef) -> Result<Entity> {
        match endpoint {
            EntityRef::Id(id) => self.graph.get_entity(id)?.ok_or_else(|| Error::NotFound {
                resource: format!("entity '{id}'"),
            }),
            EntityRef::Named { entity_type, name } => {
                if let Some(entity_type) = entity_type {
                    return self
                        .graph
                        .find_by_type_name(*entity_type, name)?
                        .ok_or_else(|| Error::NotFound {
                            resource: format!("entity '{name}' of type {entity_type}"),
                        });
                }
                let normalized = normalize_name(name);
                for entity_type in EntityType::all() {
                    if let Some(entity) = self.graph.find_by_type_name(*entity_type, &normalized)? {
                        return Ok(entity);
                    }
                }
                Err(Error::NotFound {
                    resource: format!("entity '{name}'"),
                })
            },
        }
    }

    /// Breadth-first simple-path enumeration.
    fn enumerate(
        &self,
        start: &Entity,
        end: Option<&Entity>,
        max_hops: usize,
        relation_filter: Option<&[RelationType]>,
        terminal_type: Option<EntityType>,
    ) -> Result<Vec<GraphPath>> {
        let mut paths = Vec::new();

        // max_hops = 0: a path exists only when start == end. Explicit
        // endpoints were already type-checked by the caller; an exploratory
        // anchor still has to satisfy the terminal filter.
        if max_hops == 0 {
            let matches = end.is_none_or(|e| e.id == start.id);
            let type_ok = end.is_some() || Self::terminal_matches(start, terminal_type);
            if matches && type_ok {
                paths.push(GraphPath::single(start.clone()));
            }
            return Ok(paths);
        }

        if let Some(end_entity) = end {
            if end_entity.id == start.id {
                paths.push(GraphPath::single(start.clone()));
            }
        }

        let mut frontier: VecDeque<(Vec<Entity>, Vec<Relation>)> =
            VecDeque::from([(vec![start.clone()], Vec::new())]);

        while let Some((entities, relations)) = frontier.pop_front() {
            if paths.len() >= self.options.max_paths {
                break;
            }
            if relations.len() >= max_hops {
                continue;
            }
            let Some(current) = entities.last().cloned() else {
                continue;
            };

            let mut neighbours = self.graph.relations_of(&current.id)?;
            neighbours.sort_by(|a, b| a.key().cmp(&b.key()));
            for relation in neighbours {
                if let Some(filter) = relation_filter {
                    if !filter.contains(&relation.relation_type) {
                        continue;
                    }
                }
                let next_id = if relation.source_id == current.id {
                    &relation.target_id
                } else {
                    &relation.source_id
                };
                // Simple paths only.
                if entities.iter().any(|e| &e.id == next_id) {
                    continue;
                }
                let Some(next) = self.graph.get_entity(next_id)? else {
                    continue;
                };

                let mut next_entities = entities.clone();
                next_entities.push(next.clone());
                let mut next_relations = relations.clone();
                next_relations.push(relation);

                let reached_end = match end {
                    Some(end_entity) => next.id == end_entity.id,
                    // Exploratory query: every extension is a path, subject
                    // to the far-side type filter.
                    None => Self::terminal_matches(&next, terminal_type),
                };
                if reached_end && paths.len() < self.options.max_paths {
                    paths.push(GraphPath::new(
                        next_entities.clone(),
                        next_relations.clone(),
                    ));
                }

                // Keep extending unless we just closed on a fixed endpoint.
                if end.is_none() || !reached_end {
                    frontier.push_back((next_entities, next_relations));
                }
            }
        }
        Ok(paths)
    }

    fn terminal_matches(entity: &Entity, required: Option<EntityType>) -> bool {
        required.is_none_or(|t| entity.entity_type == t)
    }
}

/// Scores a path with the public formula.
#[must_use]
pub fn score_path(path: &GraphPath, current_year: i32) -> f32 {
    if path.hops == 0 {
        return 1.0;
    }
    let confidence_sum: f32 = path.relations.iter().map(|r| r.confidence).sum();
    #[allow(clippy::cast_precision_loss)]
    let base = confidence_sum / path.hops as f32;

    let latest_year = path.relations.iter().filter_map(Relation::year).max();
    let recency_factor = latest_year.map_or(1.0, |year| {
        #[allow(clippy::cast_precision_loss)]
        let age = (current_year - year).max(0) as f32;
        (1.0 - age / RECENCY_WINDOW_YEARS).clamp(0.25, 1.0)
    });

    (base * recency_factor).clamp(0.0, 1.0)
}

/// Sorts paths best-first: score desc, then fewer hops, then ID sequence.
pub fn sort_paths(paths: &mut [GraphPath]) {
    paths.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.hops.cmp(&b.hops))
            .then_with(|| a.id_sequence().cmp(&b.id_sequence()))
    });
}

fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Utc::now().year()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::InMemoryGraphStore;

    fn graph() -> Arc<InMemoryGraphStore> {
        let store = Arc::new(InMemoryGraphStore::new());
        for (id, name, ty) in [
            ("gpt4", "GPT-4", EntityType::AiModel),
            ("transformer", "Transformer", EntityType::Technique),
            ("attention", "Attention", EntityType::Technique),
            ("openai", "OpenAI", EntityType::Organization),
        ] {
            store
                .upsert_entity(Entity::new(ty, name).with_id(EntityId::new(id)))
                .unwrap();
        }
        for (source, target, ty, confidence) in [
            ("gpt4", "transformer", RelationType::UsesTechnique, 0.95),
            ("transformer", "attention", RelationType::BasedOn, 0.9),
            ("gpt4", "openai", RelationType::DevelopedBy, 0.95),
        ] {
            store
                .upsert_relation(
                    Relation::new(EntityId::new(source), EntityId::new(target), ty)
                        .with_confidence(confidence),
                )
                .unwrap();
        }
        store
    }

    fn finder() -> PathFinder {
        PathFinder::new(graph() as Arc<dyn GraphStore>, PathFinderOptions::default())
    }

    #[test]
    fn test_direct_path_found() {
        let finder = finder();
        let result = finder
            .find_paths(&PathQuery::between(
                EntityRef::named("GPT-4"),
                EntityRef::named("Transformer"),
                3,
            ))
            .unwrap();
        assert!(!result.is_empty());
        let best = result.best().unwrap();
        assert_eq!(best.hops, 1);
        assert_eq!(best.relations[0].relation_type, RelationType::UsesTechnique);
    }

    #[test]
    fn test_two_hop_path() {
        let finder = finder();
        let result = finder
            .find_paths(&PathQuery::between(
                EntityRef::named("GPT-4"),
                EntityRef::named("Attention"),
                3,
            ))
            .unwrap();
        assert!(!result.is_empty());
        assert_eq!(result.best().unwrap().hops, 2);
    }

    #[test]
    fn test_paths_are_simple() {
        let finder = finder();
        let result = finder
            .find_paths(&PathQuery::between(
                EntityRef::named("GPT-4"),
                EntityRef::named("Attention"),
                6,
            ))
            .unwrap();
        for path in &result.paths {
            assert!(path.is_simple());
        }
    }

    #[test]
    fn test_max_hops_zero() {
        let finder = finder();
        let same = finder
            .find_paths(&PathQuery::between(
                EntityRef::named("GPT-4"),
                EntityRef::named("GPT-4"),
                0,
            ))
            .unwrap();
        assert_eq!(same.paths.len(), 1);
        assert_eq!(same.best().unwrap().hops, 0);

        let different = finder
            .find_paths(&PathQuery::between(
                EntityRef::named("GPT-4"),
                EntityRef::named("OpenAI"),
                0,
            ))
            .unwrap();
        assert!(different.is_empty());
    }

    #[test]
    fn test_relation_filter() {
        let finder = finder();
        let result = finder
            .find_paths(&PathQuery {
                start: Some(EntityRef::named("GPT-4")),
                end: Some(EntityRef::named("OpenAI")),
                max_hops: 3,
                relation_types: Some(vec![RelationType::UsesTechnique]),
                start_type: None,
                end_type: None,
            })
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_start_type_mismatch_rejects_explicit_start() {
        let finder = finder();
        let result = finder
            .find_paths(&PathQuery {
                start: Some(EntityRef::named("GPT-4")),
                end: Some(EntityRef::named("Transformer")),
                max_hops: 3,
                relation_types: None,
                start_type: Some(EntityType::Organization),
                end_type: None,
            })
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_end_type_mismatch_rejects_explicit_end() {
        let finder = finder();
        let result = finder
            .find_paths(&PathQuery {
                start: Some(EntityRef::named("GPT-4")),
                end: Some(EntityRef::named("Transformer")),
                max_hops: 3,
                relation_types: None,
                start_type: None,
                end_type: Some(EntityType::Organization),
            })
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_matching_endpoint_types_pass() {
        let finder = finder();
        let result = finder
            .find_paths(&PathQuery {
                start: Some(EntityRef::named("GPT-4")),
                end: Some(EntityRef::named("Transformer")),
                max_hops: 3,
                relation_types: None,
                start_type: Some(EntityType::AiModel),
                end_type: Some(EntityType::Technique),
            })
            .unwrap();
        assert!(!result.is_empty());
    }

    #[test]
    fn test_exploratory_end_type_filters_far_side() {
        let finder = finder();
        let result = finder
            .find_paths(&PathQuery {
                start: Some(EntityRef::named("GPT-4")),
                end: None,
                max_hops: 2,
                relation_types: None,
                start_type: None,
                end_type: Some(EntityType::Organization),
            })
            .unwrap();
        assert!(!result.is_empty());
        for path in &result.paths {
            let last = path.end().map(|e| e.entity_type);
            assert_eq!(last, Some(EntityType::Organization));
        }
    }

    #[test]
    fn test_reverse_exploratory_start_type_filters_far_side() {
        let finder = finder();
        // Only an end is given: enumeration runs backwards from OpenAI and
        // start_type must gate the discovered far-side nodes.
        let result = finder
            .find_paths(&PathQuery {
                start: None,
                end: Some(EntityRef::named("OpenAI")),
                max_hops: 2,
                relation_types: None,
                start_type: Some(EntityType::Technique),
                end_type: None,
            })
            .unwrap();
        assert!(!result.is_empty());
        for path in &result.paths {
            // Paths are enumerated anchor-first, so the far side (the
            // path's start) is the last entity.
            let far_side = path.end().map(|e| e.entity_type);
            assert_eq!(far_side, Some(EntityType::Technique));
        }
    }

    #[test]
    fn test_reverse_exploratory_end_type_gates_anchor() {
        let finder = finder();
        // end_type applies to the resolved end entity even when it is the
        // enumeration anchor.
        let result = finder
            .find_paths(&PathQuery {
                start: None,
                end: Some(EntityRef::named("OpenAI")),
                max_hops: 2,
                relation_types: None,
                start_type: None,
                end_type: Some(EntityType::Person),
            })
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_missing_endpoint_is_not_found() {
        let finder = finder();
        let err = finder
            .find_paths(&PathQuery::between(
                EntityRef::named("Nonexistent"),
                EntityRef::named("GPT-4"),
                3,
            ))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_no_endpoints_is_validation_error() {
        let finder = finder();
        let err = finder.find_paths(&PathQuery::default()).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_degrees_and_connectivity() {
        let finder = finder();
        assert_eq!(
            finder
                .degrees_of_separation(
                    &EntityRef::named("GPT-4"),
                    &EntityRef::named("Attention"),
                    6
                )
                .unwrap(),
            Some(2)
        );
        assert!(
            finder
                .are_connected(&EntityRef::named("OpenAI"), &EntityRef::named("Attention"), 6)
                .unwrap()
        );
    }

    #[test]
    fn test_common_connections() {
        let finder = finder();
        // GPT-4 is adjacent to both Transformer and OpenAI.
        let common = finder
            .common_connections(&EntityRef::named("Transformer"), &EntityRef::named("OpenAI"))
            .unwrap();
        assert_eq!(common.len(), 1);
        assert_eq!(common[0].id.as_str(), "gpt4");
    }

    #[test]
    fn test_score_prefers_recent_high_confidence() {
        let mut old_path = GraphPath::new(
            vec![
                Entity::new(EntityType::Concept, "a").with_id(EntityId::new("a")),
                Entity::new(EntityType::Concept, "b").with_id(EntityId::new("b")),
            ],
            vec![
                Relation::new(EntityId::new("a"), EntityId::new("b"), RelationType::Cites)
                    .with_confidence(0.9)
                    .with_property("year", 2005.0),
            ],
        );
        let mut new_path = old_path.clone();
        new_path.relations[0] = new_path.relations[0]
            .clone()
            .with_property("year", 2025.0);

        old_path.score = score_path(&old_path, 2026);
        new_path.score = score_path(&new_path, 2026);
        assert!(new_path.score > old_path.score);
        // Old paths bottom out at the recency floor, never zero.
        assert!(old_path.score >= 0.9 * 0.25 - f32::EPSILON);
    }

    #[test]
    fn test_normalized_query_is_stable() {
        let q1 = PathQuery::between(EntityRef::named("GPT-4"), EntityRef::named("OpenAI"), 3);
        let q2 = PathQuery::between(EntityRef::named("gpt-4 "), EntityRef::named("OpenAI"), 3);
        assert_eq!(q1.normalized(), q2.normalized());
    }
}
