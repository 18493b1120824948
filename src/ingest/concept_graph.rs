//! Concept graph construction.
//!
//! Assembles extracted concepts and co-occurrences into a weighted
//! undirected graph, partitions it with the same hierarchical detection the
//! entity graph uses, and emits both reverse indexes the lazy-budget engine
//! navigates.

use crate::community::{DetectionOptions, hierarchical_communities};
use crate::ingest::concept_extractor::ConceptExtraction;
use crate::models::{ConceptGraph, TextChunk};
use std::collections::{BTreeMap, BTreeSet};

/// Options for concept graph construction.
#[derive(Debug, Clone)]
pub struct ConceptGraphOptions {
    /// Drop co-occurrence edges weaker than this.
    pub min_edge_weight: f32,
    /// Keywords stored per community, by weighted degree centrality.
    pub top_concepts_per_community: usize,
    /// Community detection options (shared algorithm with the entity graph).
    pub detection: DetectionOptions,
}

impl Default for ConceptGraphOptions {
    fn default() -> Self {
        Self {
            min_edge_weight: 0.1,
            top_concepts_per_community: 5,
            detection: DetectionOptions::default(),
        }
    }
}

/// Builds [`ConceptGraph`]s from extraction output.
#[derive(Debug, Clone, Default)]
pub struct ConceptGraphBuilder {
    options: ConceptGraphOptions,
}

impl ConceptGraphBuilder {
    /// Creates a builder with the given options.
    #[must_use]
    pub const fn new(options: ConceptGraphOptions) -> Self {
        Self { options }
    }

    /// Builds the concept graph.
    #[must_use]
    pub fn build(&self, extraction: ConceptExtraction, chunks: &[TextChunk]) -> ConceptGraph {
        let mut graph = ConceptGraph::default();

        for concept in extraction.concepts {
            graph.concepts.insert(concept.text.clone(), concept);
        }

        graph.edges = extraction
            .cooccurrences
            .into_iter()
            .filter(|edge| {
                edge.strength >= self.options.min_edge_weight
                    && graph.concepts.contains_key(&edge.a)
                    && graph.concepts.contains_key(&edge.b)
            })
            .collect();

        // Hierarchical communities over the weighted concept adjacency.
        let mut adjacency: BTreeMap<String, Vec<(String, f32)>> = BTreeMap::new();
        for text in graph.concepts.keys() {
            adjacency.entry(text.clone()).or_default();
        }
        for edge in &graph.edges {
            adjacency
                .entry(edge.a.clone())
                .or_default()
                .push((edge.b.clone(), edge.strength));
            adjacency
                .entry(edge.b.clone())
                .or_default()
                .push((edge.a.clone(), edge.strength));
        }
        graph.communities = hierarchical_communities(&adjacency, &self.options.detection);

        // Each community keeps its top concepts by weighted degree.
        for community in &mut graph.communities {
            let mut ranked: Vec<(String, f32)> = community
                .member_ids
                .iter()
                .map(|member| {
                    let weight: f32 = adjacency
                        .get(member)
                        .map(|neighbours| neighbours.iter().map(|(_, w)| w).sum())
                        .unwrap_or(0.0);
                    (member.clone(), weight)
                })
                .collect();
            ranked.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            community.keywords = ranked
                .into_iter()
                .take(self.options.top_concepts_per_community)
                .map(|(text, _)| text)
                .collect();
        }

        // Reverse indexes: chunk → concepts and concept → chunks.
        for chunk in chunks {
            graph
                .chunk_to_concepts
                .entry(chunk.id.clone())
                .or_default();
        }
        for concept in graph.concepts.values() {
            let chunk_ids: BTreeSet<String> = concept.source_chunks.iter().cloned().collect();
            for chunk_id in &chunk_ids {
                graph
                    .chunk_to_concepts
                    .entry(chunk_id.clone())
                    .or_default()
                    .insert(concept.text.clone());
            }
            graph
                .concept_to_chunks
                .insert(concept.text.clone(), chunk_ids);
        }

        graph
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ingest::concept_extractor::{ConceptExtractor, ConceptExtractorOptions};

    fn build_graph() -> ConceptGraph {
        let chunks = vec![
            TextChunk::new("c1", "transformer attention scaling transformer attention"),
            TextChunk::new("c2", "transformer attention layers"),
            TextChunk::new("c3", "protein folding structures protein folding"),
            TextChunk::new("c4", "protein folding dynamics"),
        ];
        let extractor = ConceptExtractor::new(ConceptExtractorOptions {
            min_frequency: 2,
            max_concepts: 50,
            include_proper_nouns: true,
        });
        let extraction = extractor.extract(&chunks);
        ConceptGraphBuilder::new(ConceptGraphOptions::default()).build(extraction, &chunks)
    }

    #[test]
    fn test_reverse_indexes_agree() {
        let graph = build_graph();
        for (concept, chunk_ids) in &graph.concept_to_chunks {
            for chunk_id in chunk_ids {
                assert!(
                    graph.chunk_to_concepts[chunk_id].contains(concept),
                    "chunk {chunk_id} missing concept {concept}"
                );
            }
        }
    }

    #[test]
    fn test_edges_respect_min_weight() {
        let graph = build_graph();
        for edge in &graph.edges {
            assert!(edge.strength >= 0.1);
        }
    }

    #[test]
    fn test_communities_carry_keywords() {
        let graph = build_graph();
        assert!(!graph.communities.is_empty());
        for community in &graph.communities {
            assert!(!community.keywords.is_empty());
            assert!(community.keywords.len() <= 5);
            // Keywords are community members.
            for keyword in &community.keywords {
                assert!(community.contains(keyword));
            }
        }
    }

    #[test]
    fn test_chunks_for_concepts_lookup() {
        let graph = build_graph();
        let chunks = graph.chunks_for_concepts(["transformer"]);
        assert!(chunks.contains("c1"));
        assert!(chunks.contains("c2"));
        assert!(!chunks.contains("c3"));
    }
}
