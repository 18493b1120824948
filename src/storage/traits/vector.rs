//! Vector store trait.
//!
//! Provides top-k cosine similarity search over entity embeddings. The
//! dimension is fixed per deployment; mixing dimensions is a permanent error.

use crate::Result;
use crate::models::EntityId;
use serde::{Deserialize, Serialize};

/// Payload stored alongside a vector.
///
/// Carries at least the entity name and type so search hits can be rendered
/// without a round-trip to the graph store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorPayload {
    /// Entity name.
    pub name: String,
    /// Entity type tag.
    pub entity_type: String,
}

/// A single similarity hit.
#[derive(Debug, Clone)]
pub struct VectorHit {
    /// Entity ID of the hit.
    pub id: EntityId,
    /// Cosine similarity in [-1, 1]; results are filtered to `>= min_similarity`.
    pub score: f32,
    /// Stored payload.
    pub payload: VectorPayload,
}

/// Trait for vector store backends.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait VectorStore: Send + Sync {
    /// The fixed dimensionality of stored vectors.
    fn dimensions(&self) -> usize;

    /// Inserts or replaces the vector for an entity.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] when the vector dimension does
    /// not match [`VectorStore::dimensions`].
    fn upsert(&self, id: &EntityId, vector: &[f32], payload: VectorPayload) -> Result<()>;

    /// Searches for the `top_k` nearest vectors with `score >= min_similarity`,
    /// ordered by descending cosine similarity.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] on dimension mismatch.
    fn search(&self, vector: &[f32], top_k: usize, min_similarity: f32) -> Result<Vec<VectorHit>>;

    /// Removes the vector for an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    fn remove(&self, id: &EntityId) -> Result<bool>;

    /// Returns the number of stored vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    fn count(&self) -> Result<usize>;

    /// Returns every stored `(id, payload)` pair. Intended for export.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn all_payloads(&self) -> Result<Vec<(EntityId, VectorPayload)>>;

    /// Removes everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the clear fails.
    fn clear(&self) -> Result<()>;
}

/// Cosine similarity between two equal-length vectors.
///
/// Returns 0.0 when either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_zero_norm() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
