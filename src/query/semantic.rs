//! Text-level semantic search over the vector store.

use crate::llm::LlmClient;
use crate::storage::{VectorHit, VectorStore, cosine_similarity};
use crate::Result;
use std::sync::Arc;

/// Pairs a vector store with an embedder for text-level queries.
pub struct SemanticIndex {
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn LlmClient>,
}

impl SemanticIndex {
    /// Creates a semantic index.
    #[must_use]
    pub fn new(vectors: Arc<dyn VectorStore>, embedder: Arc<dyn LlmClient>) -> Self {
        Self { vectors, embedder }
    }

    /// Embeds the query and searches the vector store.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or search fails.
    pub fn search_text(
        &self,
        query: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<VectorHit>> {
        let vector = self.embedder.embed(query)?;
        self.vectors.search(&vector, top_k, min_similarity)
    }

    /// Cosine similarity between two texts.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails.
    pub fn similarity(&self, text_a: &str, text_b: &str) -> Result<f32> {
        let a = self.embedder.embed(text_a)?;
        let b = self.embedder.embed(text_b)?;
        Ok(cosine_similarity(&a, &b))
    }

    /// The underlying embedder.
    #[must_use]
    pub fn embedder(&self) -> &Arc<dyn LlmClient> {
        &self.embedder
    }
}
