//! Chunk repository.
//!
//! Chunks are immutable once ingested; the repository only ever inserts
//! and reads. Entities and relations reference chunks by ID for provenance
//! and context assembly.

use crate::models::TextChunk;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for chunk repositories.
pub trait ChunkStore: Send + Sync {
    /// Stores a chunk. Re-inserting an existing ID is a no-op (chunks are
    /// immutable).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn insert(&self, chunk: TextChunk) -> Result<()>;

    /// Fetches a chunk by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get(&self, id: &str) -> Result<Option<TextChunk>>;

    /// Fetches several chunks, skipping missing IDs.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get_many(&self, ids: &[String]) -> Result<Vec<TextChunk>> {
        let mut chunks = Vec::new();
        for id in ids {
            if let Some(chunk) = self.get(id)? {
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    /// Returns every stored chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn all(&self) -> Result<Vec<TextChunk>>;

    /// Number of stored chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    fn len(&self) -> Result<usize>;

    /// Whether the repository is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// In-memory [`ChunkStore`].
#[derive(Default)]
pub struct InMemoryChunkStore {
    chunks: RwLock<HashMap<String, TextChunk>>,
}

impl InMemoryChunkStore {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err() -> Error {
        Error::Fatal("chunk store lock poisoned".to_string())
    }
}

impl ChunkStore for InMemoryChunkStore {
    fn insert(&self, chunk: TextChunk) -> Result<()> {
        self.chunks
            .write()
            .map_err(|_| Self::lock_err())?
            .entry(chunk.id.clone())
            .or_insert(chunk);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<TextChunk>> {
        Ok(self
            .chunks
            .read()
            .map_err(|_| Self::lock_err())?
            .get(id)
            .cloned())
    }

    fn all(&self) -> Result<Vec<TextChunk>> {
        let mut chunks: Vec<TextChunk> = self
            .chunks
            .read()
            .map_err(|_| Self::lock_err())?
            .values()
            .cloned()
            .collect();
        chunks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(chunks)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.chunks.read().map_err(|_| Self::lock_err())?.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_are_immutable() {
        let store = InMemoryChunkStore::new();
        store.insert(TextChunk::new("c1", "original")).unwrap();
        store.insert(TextChunk::new("c1", "replacement")).unwrap();
        let chunk = store.get("c1").unwrap().unwrap();
        assert_eq!(chunk.content, "original");
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_get_many_skips_missing() {
        let store = InMemoryChunkStore::new();
        store.insert(TextChunk::new("c1", "x")).unwrap();
        let chunks = store
            .get_many(&["c1".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(chunks.len(), 1);
    }
}
