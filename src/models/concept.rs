//! Concepts and the concept graph.
//!
//! Concepts are lightweight NLP-derived noun phrases, distinct from graph
//! entities. The lazy-budget engine navigates them through a weighted
//! co-occurrence graph with hierarchical communities and two reverse
//! indexes (`chunk → concepts`, `concept → chunks`).

use crate::models::community::Community;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// An NLP-derived noun phrase.
///
/// The `text` is always normalized: lowercase, trimmed, stop-words removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// Normalized phrase text.
    pub text: String,
    /// Number of occurrences across chunks.
    pub frequency: u32,
    /// Importance in [0, 1]; the most frequent concept has importance 1.
    pub importance: f32,
    /// Chunk IDs the concept occurs in.
    pub source_chunks: BTreeSet<String>,
}

impl Concept {
    /// Creates a new concept with zero counts.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            frequency: 0,
            importance: 0.0,
            source_chunks: BTreeSet::new(),
        }
    }

    /// Records an occurrence in a chunk.
    pub fn record(&mut self, chunk_id: &str) {
        self.frequency += 1;
        self.source_chunks.insert(chunk_id.to_string());
    }
}

/// A within-chunk co-occurrence between two concepts.
///
/// The pair is stored in lexicographic order so `(a, b)` and `(b, a)`
/// collapse to one edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptCooccurrence {
    /// First concept text (lexicographically smaller).
    pub a: String,
    /// Second concept text.
    pub b: String,
    /// Number of chunks both occur in.
    pub count: u32,
    /// Normalized strength in [0, 1]: `count / max_pair_count`.
    pub strength: f32,
}

impl ConceptCooccurrence {
    /// Creates an ordered co-occurrence pair.
    #[must_use]
    pub fn new(x: &str, y: &str) -> Self {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        Self {
            a: a.to_string(),
            b: b.to_string(),
            count: 0,
            strength: 0.0,
        }
    }

    /// The canonical ordered key for this pair.
    #[must_use]
    pub fn pair_key(x: &str, y: &str) -> (String, String) {
        if x <= y {
            (x.to_string(), y.to_string())
        } else {
            (y.to_string(), x.to_string())
        }
    }
}

/// The concept graph: nodes, weighted edges, communities, reverse indexes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptGraph {
    /// Concepts keyed by normalized text.
    pub concepts: HashMap<String, Concept>,
    /// Co-occurrence edges above the builder's weight threshold.
    pub edges: Vec<ConceptCooccurrence>,
    /// Hierarchical communities over the concept nodes.
    pub communities: Vec<Community>,
    /// Reverse index: chunk ID → concept texts.
    pub chunk_to_concepts: HashMap<String, BTreeSet<String>>,
    /// Reverse index: concept text → chunk IDs.
    pub concept_to_chunks: HashMap<String, BTreeSet<String>>,
}

impl ConceptGraph {
    /// Returns the neighbours of a concept with edge strengths.
    #[must_use]
    pub fn neighbours(&self, concept: &str) -> Vec<(&str, f32)> {
        let mut out = Vec::new();
        for edge in &self.edges {
            if edge.a == concept {
                out.push((edge.b.as_str(), edge.strength));
            } else if edge.b == concept {
                out.push((edge.a.as_str(), edge.strength));
            }
        }
        out
    }

    /// Returns the chunks containing any of the given concepts, deduplicated.
    #[must_use]
    pub fn chunks_for_concepts<'a, I>(&self, concepts: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = BTreeSet::new();
        for concept in concepts {
            if let Some(chunks) = self.concept_to_chunks.get(concept) {
                out.extend(chunks.iter().cloned());
            }
        }
        out
    }

    /// The community (at level 0) a concept belongs to, if any.
    #[must_use]
    pub fn community_of(&self, concept: &str) -> Option<&Community> {
        self.communities
            .iter()
            .find(|c| c.level == 0 && c.member_ids.iter().any(|m| m == concept))
    }

    /// Number of concept nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    /// Whether the graph has no concepts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}
