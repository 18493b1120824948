//! Entity types for the research-literature knowledge graph.
//!
//! Entities are the nodes of the labelled property graph. Each one carries a
//! closed type tag, a human-readable name, free-form properties, an optional
//! embedding vector, and provenance (the chunk IDs it was asserted from).
//!
//! # Uniqueness
//!
//! `(type, normalize_name(name))` identifies an entity. The graph store and
//! the ingestion merge step both call [`normalize_name`]; the function lives
//! here so the two cannot diverge.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Unique identifier for a graph entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Creates an entity ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique entity ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("ent_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Returns the entity ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Normalizes an entity name for uniqueness and alias matching.
///
/// Lowercases, trims, and collapses internal whitespace. Shared by the graph
/// store adapter and the ingestion merge step; if the two used different
/// normalizations the `(type, name)` uniqueness invariant would break.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_space = true;
    for c in name.trim().chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            for lower in c.to_lowercase() {
                out.push(lower);
            }
            last_was_space = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Type of entity in the knowledge graph.
///
/// A closed set; extending it is a schema migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A machine-learning model (GPT-4, AlphaFold, ...).
    AiModel,
    /// Company, laboratory, or institution.
    Organization,
    /// Named individual (author, researcher).
    Person,
    /// Method or algorithmic technique (Transformer, RLHF, ...).
    Technique,
    /// Abstract research concept.
    Concept,
    /// Paper, preprint, or article.
    Publication,
    /// Evaluation benchmark or leaderboard.
    Benchmark,
    /// Training or evaluation dataset.
    Dataset,
    /// Conference, release, or other dated event.
    Event,
    /// A detected community, materialised as a graph node.
    Community,
}

impl EntityType {
    /// Returns all entity type variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::AiModel,
            Self::Organization,
            Self::Person,
            Self::Technique,
            Self::Concept,
            Self::Publication,
            Self::Benchmark,
            Self::Dataset,
            Self::Event,
            Self::Community,
        ]
    }

    /// Returns the entity type as a string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AiModel => "ai_model",
            Self::Organization => "organization",
            Self::Person => "person",
            Self::Technique => "technique",
            Self::Concept => "concept",
            Self::Publication => "publication",
            Self::Benchmark => "benchmark",
            Self::Dataset => "dataset",
            Self::Event => "event",
            Self::Community => "community",
        }
    }

    /// Parses an entity type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "ai_model" | "aimodel" | "model" => Some(Self::AiModel),
            "organization" | "org" | "company" | "lab" => Some(Self::Organization),
            "person" | "author" | "researcher" => Some(Self::Person),
            "technique" | "method" | "algorithm" => Some(Self::Technique),
            "concept" | "idea" | "topic" => Some(Self::Concept),
            "publication" | "paper" | "article" | "preprint" => Some(Self::Publication),
            "benchmark" | "leaderboard" => Some(Self::Benchmark),
            "dataset" | "corpus" => Some(Self::Dataset),
            "event" | "conference" | "release" => Some(Self::Event),
            "community" | "cluster" => Some(Self::Community),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown entity type: {s}"))
    }
}

/// A scalar, string, or string-list property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean flag.
    Bool(bool),
    /// Numeric value (years, scores, counts).
    Number(f64),
    /// Free-form text.
    Text(String),
    /// List of strings (authors, categories).
    List(Vec<String>),
}

impl PropertyValue {
    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric content, if this is a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// An entity in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier for this entity.
    pub id: EntityId,
    /// Type of entity.
    pub entity_type: EntityType,
    /// Canonical name.
    pub name: String,
    /// Textual description accumulated from mentions.
    pub description: String,
    /// Free-form properties.
    pub properties: HashMap<String, PropertyValue>,
    /// Embedding vector, fixed dimension per deployment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Chunk IDs this entity was asserted from.
    pub source_chunks: BTreeSet<String>,
    /// Extraction confidence (0.0 to 1.0).
    pub confidence: f32,
}

impl Entity {
    /// Creates a new entity.
    #[must_use]
    pub fn new(entity_type: EntityType, name: impl Into<String>) -> Self {
        Self {
            id: EntityId::generate(),
            entity_type,
            name: name.into(),
            description: String::new(),
            properties: HashMap::new(),
            embedding: None,
            source_chunks: BTreeSet::new(),
            confidence: 1.0,
        }
    }

    /// Sets a specific ID.
    #[must_use]
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the confidence score, clamped to [0, 1].
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Adds a provenance chunk ID.
    #[must_use]
    pub fn with_source_chunk(mut self, chunk_id: impl Into<String>) -> Self {
        self.source_chunks.insert(chunk_id.into());
        self
    }

    /// Sets the embedding vector.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Returns the normalized name used for uniqueness.
    #[must_use]
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Merges attributes from another observation of the same entity.
    ///
    /// New property keys are always added. Existing keys, the description,
    /// and the embedding are overwritten only when the incoming observation
    /// carries strictly higher confidence. Provenance sets are unioned and
    /// confidence becomes the maximum over observations, making the merge
    /// idempotent and order-insensitive for equal-confidence inputs.
    pub fn merge_from(&mut self, other: &Entity) {
        let overwrite = other.confidence > self.confidence;
        for (key, value) in &other.properties {
            if overwrite || !self.properties.contains_key(key) {
                self.properties.insert(key.clone(), value.clone());
            }
        }
        if (overwrite || self.description.is_empty()) && !other.description.is_empty() {
            self.description = other.description.clone();
        }
        if other.embedding.is_some() && (overwrite || self.embedding.is_none()) {
            self.embedding = other.embedding.clone();
        }
        for chunk in &other.source_chunks {
            self.source_chunks.insert(chunk.clone());
        }
        self.confidence = self.confidence.max(other.confidence);
    }

    /// Publication year recorded on this entity, if any.
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.properties.get("year").and_then(|v| match v {
            #[allow(clippy::cast_possible_truncation)]
            PropertyValue::Number(n) => Some(*n as i32),
            PropertyValue::Text(s) => s.parse().ok(),
            _ => None,
        })
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_entity_id_generate_unique() {
        let id1 = EntityId::generate();
        let id2 = EntityId::generate();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("ent_"));
    }

    #[test]
    fn test_entity_type_parse() {
        assert_eq!(EntityType::parse("ai_model"), Some(EntityType::AiModel));
        assert_eq!(EntityType::parse("AIModel"), Some(EntityType::AiModel));
        assert_eq!(EntityType::parse("org"), Some(EntityType::Organization));
        assert_eq!(EntityType::parse("paper"), Some(EntityType::Publication));
        assert_eq!(EntityType::parse("unknown"), None);
    }

    #[test]
    fn test_entity_type_roundtrip() {
        for ty in EntityType::all() {
            assert_eq!(EntityType::parse(ty.as_str()), Some(*ty));
        }
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  GPT-4  "), "gpt-4");
        assert_eq!(normalize_name("Open   AI"), "open ai");
        assert_eq!(normalize_name("Transformer"), "transformer");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_entity_builder() {
        let entity = Entity::new(EntityType::AiModel, "GPT-4")
            .with_confidence(0.95)
            .with_description("A large language model")
            .with_property("year", 2023.0)
            .with_source_chunk("chunk-1");

        assert_eq!(entity.entity_type, EntityType::AiModel);
        assert_eq!(entity.name, "GPT-4");
        assert_eq!(entity.confidence, 0.95);
        assert_eq!(entity.year(), Some(2023));
        assert!(entity.source_chunks.contains("chunk-1"));
    }

    #[test]
    fn test_confidence_clamping() {
        let entity = Entity::new(EntityType::Concept, "Test").with_confidence(1.5);
        assert_eq!(entity.confidence, 1.0);
        let entity = Entity::new(EntityType::Concept, "Test").with_confidence(-0.5);
        assert_eq!(entity.confidence, 0.0);
    }

    #[test]
    fn test_merge_keeps_max_confidence_and_unions_provenance() {
        let mut a = Entity::new(EntityType::AiModel, "GPT-4")
            .with_confidence(0.8)
            .with_property("params", "1.7T")
            .with_source_chunk("c1");
        let b = Entity::new(EntityType::AiModel, "GPT-4")
            .with_confidence(0.6)
            .with_property("params", "unknown")
            .with_property("year", 2023.0)
            .with_source_chunk("c2");

        a.merge_from(&b);

        // Lower-confidence observation must not overwrite existing keys.
        assert_eq!(
            a.properties.get("params"),
            Some(&PropertyValue::Text("1.7T".to_string()))
        );
        // But new keys are added.
        assert_eq!(a.year(), Some(2023));
        assert_eq!(a.confidence, 0.8);
        assert!(a.source_chunks.contains("c1"));
        assert!(a.source_chunks.contains("c2"));
    }

    #[test]
    fn test_merge_higher_confidence_overwrites() {
        let mut a = Entity::new(EntityType::AiModel, "GPT-4")
            .with_confidence(0.5)
            .with_property("params", "unknown");
        let b = Entity::new(EntityType::AiModel, "GPT-4")
            .with_confidence(0.9)
            .with_description("OpenAI's flagship model")
            .with_property("params", "1.7T");

        a.merge_from(&b);

        assert_eq!(
            a.properties.get("params"),
            Some(&PropertyValue::Text("1.7T".to_string()))
        );
        assert_eq!(a.description, "OpenAI's flagship model");
        assert_eq!(a.confidence, 0.9);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut a = Entity::new(EntityType::Technique, "Transformer")
            .with_confidence(0.7)
            .with_source_chunk("c1");
        let b = a.clone();
        let once = {
            let mut x = a.clone();
            x.merge_from(&b);
            x
        };
        a.merge_from(&b);
        a.merge_from(&b);
        assert_eq!(a, once);
    }

    proptest! {
        /// Property: normalization is idempotent.
        #[test]
        fn prop_normalize_idempotent(s in "\\PC{0,64}") {
            let once = normalize_name(&s);
            let twice = normalize_name(&once);
            prop_assert_eq!(once, twice);
        }

        /// Property: normalized names never carry leading/trailing/double spaces.
        #[test]
        fn prop_normalize_no_stray_whitespace(s in "\\PC{0,64}") {
            let n = normalize_name(&s);
            prop_assert!(!n.starts_with(' '));
            prop_assert!(!n.ends_with(' '));
            prop_assert!(!n.contains("  "));
        }

        /// Property: normalization is case-insensitive.
        #[test]
        fn prop_normalize_case_insensitive(s in "[a-zA-Z0-9 -]{0,40}") {
            prop_assert_eq!(
                normalize_name(&s.to_uppercase()),
                normalize_name(&s.to_lowercase())
            );
        }
    }
}
