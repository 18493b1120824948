//! Text chunks, the immutable unit of ingestion.

use serde::{Deserialize, Serialize};

/// Metadata attached to a text chunk at ingestion time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source document identifier (arXiv ID, DOI, file hash).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Document title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Author names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    /// Subject categories (e.g. arXiv categories).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    /// Publication year.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Character offset of this chunk within the source document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

/// An immutable text fragment with provenance.
///
/// Chunks are never mutated after ingestion; entities and relations point
/// back at them by ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Chunk identifier.
    pub id: String,
    /// Chunk content.
    pub content: String,
    /// Optional source metadata.
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl TextChunk {
    /// Creates a new chunk.
    #[must_use]
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: ChunkMetadata::default(),
        }
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the publication year.
    #[must_use]
    pub const fn with_year(mut self, year: i32) -> Self {
        self.metadata.year = Some(year);
        self
    }

    /// Returns a short excerpt for citation display.
    #[must_use]
    pub fn excerpt(&self, max_chars: usize) -> String {
        if self.content.chars().count() <= max_chars {
            return self.content.clone();
        }
        let cut: String = self.content.chars().take(max_chars).collect();
        format!("{}…", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_excerpt() {
        let chunk = TextChunk::new("c1", "GPT-4 is a large language model.");
        assert_eq!(chunk.excerpt(100), "GPT-4 is a large language model.");
        assert_eq!(chunk.excerpt(5), "GPT-4…");
    }

    #[test]
    fn test_metadata_defaults() {
        let chunk = TextChunk::new("c1", "text").with_year(2023);
        assert_eq!(chunk.metadata.year, Some(2023));
        assert!(chunk.metadata.authors.is_empty());
    }
}
