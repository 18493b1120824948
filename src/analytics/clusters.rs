//! Research-cluster analytics over the community layer.

use crate::community::CommunityPersister;
use crate::models::{Community, CommunityId, Entity, EntityId, EntityType};
use crate::query::SemanticIndex;
use crate::storage::GraphStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Options for cluster analytics.
#[derive(Debug, Clone)]
pub struct ClusterAnalyzerOptions {
    /// Ignore communities smaller than this.
    pub min_cluster_size: usize,
    /// Pairs with connection strength below this are gaps.
    pub gap_threshold: f32,
    /// Window for the growth-rate numerator, in years.
    pub growth_window_years: i32,
    /// Keyword-similarity floor for semantic bridges.
    pub bridge_similarity: f32,
}

impl Default for ClusterAnalyzerOptions {
    fn default() -> Self {
        Self {
            min_cluster_size: 3,
            gap_threshold: 0.1,
            growth_window_years: 3,
            bridge_similarity: 0.7,
        }
    }
}

/// Annotated view of one community.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInsight {
    /// The underlying community.
    pub community: Community,
    /// Mean publication year of dated members.
    pub avg_publication_year: Option<f32>,
    /// Members of type publication.
    pub publication_count: usize,
    /// Publications in the growth window vs. prior, as a ratio.
    pub growth_rate: f32,
    /// Connection strength to every other analyzed cluster.
    pub connections: BTreeMap<CommunityId, f32>,
}

/// An under-connected cluster pair with candidate bridges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterGap {
    /// First cluster.
    pub a: CommunityId,
    /// Second cluster.
    pub b: CommunityId,
    /// Observed connection strength, below the gap threshold.
    pub connection_strength: f32,
    /// Topics that could bridge the two clusters.
    pub bridge_topics: Vec<String>,
}

/// Analyzes the materialised community layer.
pub struct ClusterAnalyzer {
    graph: Arc<dyn GraphStore>,
    persister: CommunityPersister,
    semantic: Option<Arc<SemanticIndex>>,
    options: ClusterAnalyzerOptions,
    reference_year: i32,
}

impl ClusterAnalyzer {
    /// Creates an analyzer.
    #[must_use]
    pub fn new(
        graph: Arc<dyn GraphStore>,
        persister: CommunityPersister,
        options: ClusterAnalyzerOptions,
    ) -> Self {
        use chrono::Datelike;
        Self {
            graph,
            persister,
            semantic: None,
            options,
            reference_year: chrono::Utc::now().year(),
        }
    }

    /// Adds a semantic index for bridge discovery.
    #[must_use]
    pub fn with_semantic(mut self, semantic: Arc<SemanticIndex>) -> Self {
        self.semantic = Some(semantic);
        self
    }

    /// Pins the reference year (for reproducible analytics and tests).
    #[must_use]
    pub const fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    /// Annotates every community of size >= `min_cluster_size`.
    ///
    /// # Errors
    ///
    /// Returns an error if store reads fail.
    pub fn analyze_existing_clusters(&self) -> Result<Vec<ClusterInsight>> {
        let communities: Vec<Community> = self
            .persister
            .load_layer()?
            .into_iter()
            .filter(|c| c.level == 0 && c.member_count() >= self.options.min_cluster_size)
            .collect();

        let mut members: Vec<Vec<Entity>> = Vec::new();
        for community in &communities {
            let mut entities = Vec::new();
            for member in &community.member_ids {
                if let Some(entity) = self.graph.get_entity(&EntityId::new(member.clone()))? {
                    entities.push(entity);
                }
            }
            members.push(entities);
        }

        let mut insights = Vec::new();
        for (i, community) in communities.iter().enumerate() {
            let entities = &members[i];
            let years: Vec<i32> = entities.iter().filter_map(Entity::year).collect();
            #[allow(clippy::cast_precision_loss)]
            let avg_publication_year = if years.is_empty() {
                None
            } else {
                Some(years.iter().sum::<i32>() as f32 / years.len() as f32)
            };

            let publication_count = entities
                .iter()
                .filter(|e| e.entity_type == EntityType::Publication)
                .count();

            let cutoff = self.reference_year - self.options.growth_window_years;
            let recent = entities
                .iter()
                .filter(|e| {
                    e.entity_type == EntityType::Publication
                        && e.year().is_some_and(|y| y > cutoff)
                })
                .count();
            let prior = publication_count.saturating_sub(recent);
            #[allow(clippy::cast_precision_loss)]
            let growth_rate = if prior == 0 {
                if recent > 0 { 1.0 } else { 0.0 }
            } else {
                recent as f32 / prior as f32
            };

            let mut connections = BTreeMap::new();
            for (j, other) in communities.iter().enumerate() {
                if i == j {
                    continue;
                }
                let strength = self.connection_strength(entities, &members[j])?;
                connections.insert(other.id.clone(), strength);
            }

            insights.push(ClusterInsight {
                community: community.clone(),
                avg_publication_year,
                publication_count,
                growth_rate,
                connections,
            });
        }
        Ok(insights)
    }

    /// Ordered cluster pairs whose connection strength is below the gap
    /// threshold, enriched with bridge topics: shared keywords first, then
    /// vector-semantic keyword bridges, then entities adjacent to both.
    ///
    /// # Errors
    ///
    /// Returns an error if store reads fail.
    pub fn find_cluster_gaps(&self) -> Result<Vec<ClusterGap>> {
        let insights = self.analyze_existing_clusters()?;
        let mut gaps = Vec::new();

        for (i, insight) in insights.iter().enumerate() {
            for other in insights.iter().skip(i + 1) {
                let strength = insight
                    .connections
                    .get(&other.community.id)
                    .copied()
                    .unwrap_or(0.0);
                if strength >= self.options.gap_threshold {
                    continue;
                }
                let bridge_topics = self.bridge_topics(&insight.community, &other.community)?;
                gaps.push(ClusterGap {
                    a: insight.community.id.clone(),
                    b: other.community.id.clone(),
                    connection_strength: strength,
                    bridge_topics,
                });
            }
        }

        gaps.sort_by(|x, y| {
            x.connection_strength
                .partial_cmp(&y.connection_strength)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| x.a.cmp(&y.a))
        });
        Ok(gaps)
    }

    /// Cross-cluster edge density: edges between the two member sets over
    /// the smaller set's size, clamped to [0, 1].
    fn connection_strength(&self, a: &[Entity], b: &[Entity]) -> Result<f32> {
        let ids_b: BTreeSet<&EntityId> = b.iter().map(|e| &e.id).collect();
        let mut cross_edges = 0usize;
        for entity in a {
            for relation in self.graph.relations_of(&entity.id)? {
                let other = if relation.source_id == entity.id {
                    &relation.target_id
                } else {
                    &relation.source_id
                };
                if ids_b.contains(other) {
                    cross_edges += 1;
                }
            }
        }
        let denominator = a.len().min(b.len()).max(1);
        #[allow(clippy::cast_precision_loss)]
        let strength = cross_edges as f32 / denominator as f32;
        Ok(strength.clamp(0.0, 1.0))
    }

    fn bridge_topics(&self, a: &Community, b: &Community) -> Result<Vec<String>> {
        // 1. Shared keywords.
        let keywords_a: BTreeSet<&String> = a.keywords.iter().collect();
        let shared: Vec<String> = b
            .keywords
            .iter()
            .filter(|k| keywords_a.contains(k))
            .cloned()
            .collect();
        if !shared.is_empty() {
            return Ok(shared);
        }

        // 2. Vector-semantic keyword bridges.
        if let Some(semantic) = &self.semantic {
            let mut bridges = Vec::new();
            for ka in &a.keywords {
                for kb in &b.keywords {
                    if let Ok(similarity) = semantic.similarity(ka, kb) {
                        if similarity >= self.options.bridge_similarity {
                            bridges.push(format!("{ka} / {kb}"));
                        }
                    }
                }
            }
            if !bridges.is_empty() {
                bridges.sort();
                return Ok(bridges);
            }
        }

        // 3. Entities adjacent to members of both clusters.
        let members_a: BTreeSet<&String> = a.member_ids.iter().collect();
        let members_b: BTreeSet<&String> = b.member_ids.iter().collect();
        let mut adjacent_a: BTreeSet<String> = BTreeSet::new();
        for member in &a.member_ids {
            for relation in self.graph.relations_of(&EntityId::new(member.clone()))? {
                let other = if relation.source_id.as_str() == member {
                    relation.target_id.as_str()
                } else {
                    relation.source_id.as_str()
                };
                let owned = other.to_string();
                if !members_a.contains(&owned) {
                    adjacent_a.insert(owned);
                }
            }
        }
        let mut bridges = Vec::new();
        for member in &b.member_ids {
            for relation in self.graph.relations_of(&EntityId::new(member.clone()))? {
                let other = if relation.source_id.as_str() == member {
                    relation.target_id.as_str()
                } else {
                    relation.source_id.as_str()
                };
                let owned = other.to_string();
                if adjacent_a.contains(&owned) && !members_b.contains(&owned) {
                    if let Some(entity) = self.graph.get_entity(&EntityId::new(owned))? {
                        bridges.push(entity.name);
                    }
                }
            }
        }
        bridges.sort();
        bridges.dedup();
        Ok(bridges)
    }
}
