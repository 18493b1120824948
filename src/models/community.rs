//! Community partitions over the graph.
//!
//! A community is a partition cell at some hierarchical level: level 0 is the
//! finest, parents live one level up, and a parent's member set equals the
//! union of its children's members. Membership is modelled arena-style:
//! members reference the community by ID and the community holds member IDs,
//! so there is no owning pointer in either direction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a community.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommunityId(String);

impl CommunityId {
    /// Creates a community ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds the conventional ID for a detected community.
    #[must_use]
    pub fn for_level(level: u32, index: usize) -> Self {
        Self(format!("com_l{level}_{index}"))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CommunityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A community of entities (or concepts) at some hierarchy level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    /// Community identifier.
    pub id: CommunityId,
    /// Hierarchy level; 0 is the finest partition.
    pub level: u32,
    /// Member IDs (entity IDs, or concept texts for concept communities).
    pub member_ids: Vec<String>,
    /// Parent community at `level + 1`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CommunityId>,
    /// Child communities at `level - 1`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_ids: Vec<CommunityId>,
    /// LLM-generated summary, if computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Keywords extracted during summarisation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl Community {
    /// Creates a new community.
    #[must_use]
    pub fn new(id: CommunityId, level: u32, member_ids: Vec<String>) -> Self {
        Self {
            id,
            level,
            member_ids,
            parent_id: None,
            child_ids: Vec::new(),
            summary: None,
            keywords: Vec::new(),
        }
    }

    /// Number of members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.member_ids.len()
    }

    /// Whether the given ID is a member.
    #[must_use]
    pub fn contains(&self, member: &str) -> bool {
        self.member_ids.iter().any(|m| m == member)
    }

    /// Sets the summary and keywords.
    pub fn set_summary(&mut self, summary: impl Into<String>, keywords: Vec<String>) {
        self.summary = Some(summary.into());
        self.keywords = keywords;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_community_id_for_level() {
        let id = CommunityId::for_level(1, 3);
        assert_eq!(id.as_str(), "com_l1_3");
    }

    #[test]
    fn test_membership() {
        let community = Community::new(
            CommunityId::for_level(0, 0),
            0,
            vec!["a".to_string(), "b".to_string()],
        );
        assert_eq!(community.member_count(), 2);
        assert!(community.contains("a"));
        assert!(!community.contains("c"));
    }

    #[test]
    fn test_set_summary() {
        let mut community = Community::new(CommunityId::for_level(0, 0), 0, vec![]);
        community.set_summary("Optimization research", vec!["optimization".to_string()]);
        assert_eq!(
            community.summary.as_deref(),
            Some("Optimization research")
        );
        assert_eq!(community.keywords.len(), 1);
    }
}
