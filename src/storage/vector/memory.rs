//! In-memory vector store backend.
//!
//! Exact cosine search over a `RwLock`-protected map. Good for tests and
//! small deployments; an ANN-backed implementation plugs in behind the same
//! trait.

use crate::models::EntityId;
use crate::storage::traits::vector::{VectorHit, VectorPayload, VectorStore, cosine_similarity};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory [`VectorStore`] implementation with a fixed dimension.
pub struct InMemoryVectorStore {
    dimensions: usize,
    vectors: RwLock<HashMap<EntityId, (Vec<f32>, VectorPayload)>>,
}

impl InMemoryVectorStore {
    /// Creates a store for vectors of the given dimension.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: RwLock::new(HashMap::new()),
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() == self.dimensions {
            Ok(())
        } else {
            Err(Error::Validation {
                field: "vector".to_string(),
                message: format!(
                    "dimension mismatch: got {}, store is {}",
                    vector.len(),
                    self.dimensions
                ),
            })
        }
    }
}

impl VectorStore for InMemoryVectorStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn upsert(&self, id: &EntityId, vector: &[f32], payload: VectorPayload) -> Result<()> {
        self.check_dimension(vector)?;
        self.vectors
            .write()
            .map_err(|_| Error::Fatal("vector store lock poisoned".to_string()))?
            .insert(id.clone(), (vector.to_vec(), payload));
        Ok(())
    }

    fn search(&self, vector: &[f32], top_k: usize, min_similarity: f32) -> Result<Vec<VectorHit>> {
        self.check_dimension(vector)?;
        let vectors = self
            .vectors
            .read()
            .map_err(|_| Error::Fatal("vector store lock poisoned".to_string()))?;
        let mut hits: Vec<VectorHit> = vectors
            .iter()
            .filter_map(|(id, (stored, payload))| {
                let score = cosine_similarity(vector, stored);
                (score >= min_similarity).then(|| VectorHit {
                    id: id.clone(),
                    score,
                    payload: payload.clone(),
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    fn remove(&self, id: &EntityId) -> Result<bool> {
        Ok(self
            .vectors
            .write()
            .map_err(|_| Error::Fatal("vector store lock poisoned".to_string()))?
            .remove(id)
            .is_some())
    }

    fn count(&self) -> Result<usize> {
        Ok(self
            .vectors
            .read()
            .map_err(|_| Error::Fatal("vector store lock poisoned".to_string()))?
            .len())
    }

    fn all_payloads(&self) -> Result<Vec<(EntityId, VectorPayload)>> {
        let vectors = self
            .vectors
            .read()
            .map_err(|_| Error::Fatal("vector store lock poisoned".to_string()))?;
        let mut out: Vec<(EntityId, VectorPayload)> = vectors
            .iter()
            .map(|(id, (_, payload))| (id.clone(), payload.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn clear(&self) -> Result<()> {
        self.vectors
            .write()
            .map_err(|_| Error::Fatal("vector store lock poisoned".to_string()))?
            .clear();
        Ok(())
    }
}
