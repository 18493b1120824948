//! Query/response types shared by the retrieval engines.

use crate::models::chunk::TextChunk;
use crate::models::entity::Entity;
use crate::models::relation::Relation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which retrieval strategy produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Entity-neighbourhood retrieval.
    Local,
    /// Community-summary retrieval.
    Global,
    /// Concurrent local + global retrieval.
    Hybrid,
    /// Multi-hop path reasoning.
    Path,
    /// Budgeted lazy retrieval.
    Lazy,
}

impl QueryType {
    /// Returns the query type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Global => "global",
            Self::Hybrid => "hybrid",
            Self::Path => "path",
            Self::Lazy => "lazy",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How seed entities are retrieved for a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Exact/lexical name matching only.
    Keyword,
    /// Vector similarity only.
    Semantic,
    /// Both, merged.
    #[default]
    Hybrid,
}

impl SearchMode {
    /// Returns the search mode as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }

    /// Parses a search mode from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "keyword" => Some(Self::Keyword),
            "semantic" => Some(Self::Semantic),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// What kind of source a citation points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationSource {
    /// A graph entity.
    Entity,
    /// A community summary.
    Community,
    /// A source document/chunk.
    Document,
}

/// A citation attached to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// ID of the cited source.
    pub source_id: String,
    /// Human-readable source name.
    pub source_name: String,
    /// Kind of source.
    pub source_type: CitationSource,
    /// Relevance in [0, 1].
    pub relevance: f32,
    /// Optional supporting excerpt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl Citation {
    /// Creates a citation.
    #[must_use]
    pub fn new(
        source_id: impl Into<String>,
        source_name: impl Into<String>,
        source_type: CitationSource,
        relevance: f32,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_name: source_name.into(),
            source_type,
            relevance: relevance.clamp(0.0, 1.0),
            excerpt: None,
        }
    }

    /// Attaches an excerpt.
    #[must_use]
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }
}

/// The retrieval context an answer was generated from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryContext {
    /// Entities in context.
    pub entities: Vec<Entity>,
    /// Relations in context.
    pub relations: Vec<Relation>,
    /// Community summaries in context.
    pub community_summaries: Vec<String>,
    /// Text chunks in context.
    pub text_chunks: Vec<TextChunk>,
}

impl QueryContext {
    /// Whether the context is completely empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.relations.is_empty()
            && self.community_summaries.is_empty()
            && self.text_chunks.is_empty()
    }
}

/// Timings and counts for a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryMetrics {
    /// Time spent retrieving context, in milliseconds.
    pub retrieval_ms: u64,
    /// Time spent generating the answer, in milliseconds.
    pub generation_ms: u64,
    /// Entities in context.
    pub entities: usize,
    /// Relations in context.
    pub relations: usize,
    /// Communities consulted.
    pub communities: usize,
    /// LLM tokens consumed.
    pub tokens: u32,
}

/// A complete response from the query engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// The original query.
    pub query: String,
    /// The generated answer (empty on failure).
    pub answer: String,
    /// Which strategy produced the answer.
    pub query_type: QueryType,
    /// Citations, deterministically ordered (descending relevance, then ID).
    pub citations: Vec<Citation>,
    /// The retrieval context used.
    pub context: QueryContext,
    /// Timings and counts.
    pub metrics: QueryMetrics,
    /// Whether the query succeeded.
    pub success: bool,
    /// Error description when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    /// Creates a successful response.
    #[must_use]
    pub fn ok(query: impl Into<String>, answer: impl Into<String>, query_type: QueryType) -> Self {
        Self {
            query: query.into(),
            answer: answer.into(),
            query_type,
            citations: Vec::new(),
            context: QueryContext::default(),
            metrics: QueryMetrics::default(),
            success: true,
            error: None,
        }
    }

    /// Creates a failure response.
    #[must_use]
    pub fn failure(
        query: impl Into<String>,
        query_type: QueryType,
        error: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            answer: String::new(),
            query_type,
            citations: Vec::new(),
            context: QueryContext::default(),
            metrics: QueryMetrics::default(),
            success: false,
            error: Some(error.into()),
        }
    }

    /// Sorts citations into their deterministic order:
    /// descending relevance, ties broken by ascending source ID.
    pub fn finalize_citations(&mut self) {
        self.citations.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source_id.cmp(&b.source_id))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_mode_parse() {
        assert_eq!(SearchMode::parse("keyword"), Some(SearchMode::Keyword));
        assert_eq!(SearchMode::parse("SEMANTIC"), Some(SearchMode::Semantic));
        assert_eq!(SearchMode::parse("x"), None);
        assert_eq!(SearchMode::default(), SearchMode::Hybrid);
    }

    #[test]
    fn test_citation_relevance_clamped() {
        let citation = Citation::new("e1", "GPT-4", CitationSource::Entity, 1.7);
        assert!((citation.relevance - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_citation_ordering_is_deterministic() {
        let mut response = QueryResponse::ok("q", "a", QueryType::Local);
        response.citations = vec![
            Citation::new("b", "B", CitationSource::Entity, 0.5),
            Citation::new("a", "A", CitationSource::Entity, 0.5),
            Citation::new("c", "C", CitationSource::Entity, 0.9),
        ];
        response.finalize_citations();
        let ids: Vec<&str> = response.citations.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_failure_response() {
        let response = QueryResponse::failure("q", QueryType::Hybrid, "both branches failed");
        assert!(!response.success);
        assert!(response.answer.is_empty());
        assert_eq!(response.error.as_deref(), Some("both branches failed"));
    }
}
