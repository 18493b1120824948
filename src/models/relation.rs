//! Relation types for the knowledge graph.
//!
//! Relations are directed, labelled edges between entities. The triple
//! `(source_id, target_id, type)` identifies an edge; duplicate assertions
//! merge, keeping the maximum confidence and the union of provenance.

use crate::models::entity::{EntityId, PropertyValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Type of relation between entities.
///
/// A closed set; extending it is a schema migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    /// Model or artifact developed by an organization.
    DevelopedBy,
    /// Model or system uses a technique.
    UsesTechnique,
    /// Work builds on earlier work.
    BasedOn,
    /// Person employed at an organization.
    EmployedAt,
    /// Model evaluated on a benchmark.
    EvaluatedOn,
    /// Person authored a publication.
    Authored,
    /// Person is a member of an organization or group.
    MemberOf,
    /// Work improves over another work.
    Improves,
    /// Artifact derived from another artifact.
    DerivedFrom,
    /// Entity belongs to a community.
    BelongsTo,
    /// Publication cites another publication.
    Cites,
}

impl RelationType {
    /// Returns all relation type variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::DevelopedBy,
            Self::UsesTechnique,
            Self::BasedOn,
            Self::EmployedAt,
            Self::EvaluatedOn,
            Self::Authored,
            Self::MemberOf,
            Self::Improves,
            Self::DerivedFrom,
            Self::BelongsTo,
            Self::Cites,
        ]
    }

    /// Returns the relation type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DevelopedBy => "DEVELOPED_BY",
            Self::UsesTechnique => "USES_TECHNIQUE",
            Self::BasedOn => "BASED_ON",
            Self::EmployedAt => "EMPLOYED_AT",
            Self::EvaluatedOn => "EVALUATED_ON",
            Self::Authored => "AUTHORED",
            Self::MemberOf => "MEMBER_OF",
            Self::Improves => "IMPROVES",
            Self::DerivedFrom => "DERIVED_FROM",
            Self::BelongsTo => "BELONGS_TO",
            Self::Cites => "CITES",
        }
    }

    /// Parses a relation type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "DEVELOPED_BY" | "DEVELOPEDBY" => Some(Self::DevelopedBy),
            "USES_TECHNIQUE" | "USESTECHNIQUE" | "USES" => Some(Self::UsesTechnique),
            "BASED_ON" | "BASEDON" => Some(Self::BasedOn),
            "EMPLOYED_AT" | "EMPLOYEDAT" | "WORKS_AT" => Some(Self::EmployedAt),
            "EVALUATED_ON" | "EVALUATEDON" => Some(Self::EvaluatedOn),
            "AUTHORED" | "WROTE" => Some(Self::Authored),
            "MEMBER_OF" | "MEMBEROF" => Some(Self::MemberOf),
            "IMPROVES" | "OUTPERFORMS" => Some(Self::Improves),
            "DERIVED_FROM" | "DERIVEDFROM" => Some(Self::DerivedFrom),
            "BELONGS_TO" | "BELONGSTO" => Some(Self::BelongsTo),
            "CITES" | "REFERENCES" => Some(Self::Cites),
            _ => None,
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown relation type: {s}"))
    }
}

/// The identifying triple of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationKey {
    /// Source entity ID.
    pub source_id: EntityId,
    /// Target entity ID.
    pub target_id: EntityId,
    /// Relation type.
    pub relation_type: RelationType,
}

impl PartialOrd for RelationType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RelationType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

/// A directed, labelled edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Source entity ID.
    pub source_id: EntityId,
    /// Target entity ID.
    pub target_id: EntityId,
    /// Type of relation.
    pub relation_type: RelationType,
    /// Confidence score (0.0 to 1.0).
    pub confidence: f32,
    /// Optional properties.
    pub properties: HashMap<String, PropertyValue>,
    /// Chunk IDs this relation was asserted from.
    pub source_chunks: BTreeSet<String>,
}

impl Relation {
    /// Creates a new relation.
    #[must_use]
    pub fn new(source_id: EntityId, target_id: EntityId, relation_type: RelationType) -> Self {
        Self {
            source_id,
            target_id,
            relation_type,
            confidence: 1.0,
            properties: HashMap::new(),
            source_chunks: BTreeSet::new(),
        }
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

    /// Returns the identifying triple of this edge.
    #[must_use]
    pub fn key(&self) -> RelationKey {
        RelationKey {
            source_id: self.source_id.clone(),
            target_id: self.target_id.clone(),
            relation_type: self.relation_type,
        }
    }

    /// Merges a duplicate assertion of the same edge.
    ///
    /// Keeps the maximum confidence, unions provenance, and adds missing
    /// property keys without overwriting existing ones at equal confidence.
    pub fn merge_from(&mut self, other: &Relation) {
        let overwrite = other.confidence > self.confidence;
        for (key, value) in &other.properties {
            if overwrite || !self.properties.contains_key(key) {
                self.properties.insert(key.clone(), value.clone());
            }
        }
        for chunk in &other.source_chunks {
            self.source_chunks.insert(chunk.clone());
        }
        self.confidence = self.confidence.max(other.confidence);
    }

    /// The provenance year recorded on this relation, if any.
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

    #[test]
    fn test_relation_type_roundtrip() {
        for ty in RelationType::all() {
            assert_eq!(RelationType::parse(ty.as_str()), Some(*ty));
        }
    }

    #[test]
    fn test_relation_type_parse_aliases() {
        assert_eq!(
            RelationType::parse("developed_by"),
            Some(RelationType::DevelopedBy)
        );
        assert_eq!(
            RelationType::parse("uses-technique"),
            Some(RelationType::UsesTechnique)
        );
        assert_eq!(RelationType::parse("nonsense"), None);
    }

    #[test]
    fn test_relation_creation() {
        let rel = Relation::new(
            EntityId::new("gpt4"),
            EntityId::new("openai"),
            RelationType::DevelopedBy,
        )
        .with_confidence(0.95)
        .with_source_chunk("c1");

        assert_eq!(rel.source_id.as_str(), "gpt4");
        assert_eq!(rel.target_id.as_str(), "openai");
        assert_eq!(rel.confidence, 0.95);
        assert!(rel.source_chunks.contains("c1"));
    }

    #[test]
    fn test_key_identifies_edge() {
        let a = Relation::new(
            EntityId::new("x"),
            EntityId::new("y"),
            RelationType::Cites,
        );
        let b = Relation::new(
            EntityId::new("x"),
            EntityId::new("y"),
            RelationType::Cites,
        )
        .with_confidence(0.2);
        assert_eq!(a.key(), b.key());

        let c = Relation::new(
            EntityId::new("y"),
            EntityId::new("x"),
            RelationType::Cites,
        );
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_merge_keeps_max_confidence() {
        let mut a = Relation::new(
            EntityId::new("x"),
            EntityId::new("y"),
            RelationType::Improves,
        )
        .with_confidence(0.6)
        .with_source_chunk("c1");
        let b = a.clone().with_confidence(0.9).with_source_chunk("c2");

        a.merge_from(&b);
        assert_eq!(a.confidence, 0.9);
        assert!(a.source_chunks.contains("c1"));
        assert!(a.source_chunks.contains("c2"));

        // Merging again changes nothing.
        let snapshot = a.clone();
        a.merge_from(&b);
        assert_eq!(a, snapshot);
    }
}
