//! Idempotent reconciliation of extracted entities and relations.
//!
//! Entities merge first; relation endpoints are rewritten from chunk-local
//! `temp_id`s to persistent IDs only after entity merge completes. Vector
//! upserts are best-effort: the graph write is the source of truth and a
//! failed embedding is logged and compensated on the next ingestion of the
//! same entity.

use crate::ingest::entity_extractor::ExtractedEntity;
use crate::ingest::relation_extractor::ExtractedRelation;
use crate::llm::LlmClient;
use crate::models::{Entity, EntityId, Relation};
use crate::storage::{GraphStore, VectorPayload, VectorStore};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Merges extraction output into the graph and vector stores.
pub struct GraphMerger {
    graph: Arc<dyn GraphStore>,
    vectors: Option<Arc<dyn VectorStore>>,
    embedder: Option<Arc<dyn LlmClient>>,
}

impl GraphMerger {
    /// Creates a merger writing to the graph store only.
    #[must_use]
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self {
            graph,
            vectors: None,
            embedder: None,
        }
    }

    /// Adds embedding upserts into a vector store.
    #[must_use]
    pub fn with_vectors(
        mut self,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn LlmClient>,
    ) -> Self {
        self.vectors = Some(vectors);
        self.embedder = Some(embedder);
        self
    }

    /// Merges extracted entities, returning the `temp_id` → persistent-ID map.
    ///
    /// For each mention the store is asked for a `(type, normalized name)`
    /// match; an existing entity is merged, a missing one created. The call
    /// is idempotent: re-merging the same mentions leaves the graph
    /// unchanged apart from provenance unions.
    ///
    /// # Errors
    ///
    /// Returns an error when a graph write fails. Vector failures are
    /// logged, not propagated.
    pub fn merge_entities(
        &self,
        chunk_id: &str,
        extracted: &[ExtractedEntity],
    ) -> Result<HashMap<String, EntityId>> {
        let mut id_map = HashMap::new();
        for mention in extracted {
            let entity = Entity::new(mention.entity_type, mention.name.clone())
                .with_description(mention.description.clone())
                .with_confidence(mention.confidence)
                .with_source_chunk(chunk_id);
            let persistent_id = self.graph.upsert_entity(entity)?;
            self.upsert_embedding(&persistent_id, mention);
            id_map.insert(mention.temp_id.clone(), persistent_id);
        }
        Ok(id_map)
    }

    /// Merges extracted relations after their endpoints were merged.
    ///
    /// Relations whose `temp_id`s are missing from `id_map` are dropped.
    /// Returns the number of relations written.
    ///
    /// # Errors
    ///
    /// Returns an error when a graph write fails.
    pub fn merge_relations(
        &self,
        chunk_id: &str,
        extracted: &[ExtractedRelation],
        id_map: &HashMap<String, EntityId>,
    ) -> Result<usize> {
        let mut written = 0;
        for relation in extracted {
            let (Some(source), Some(target)) = (
                id_map.get(&relation.source_temp_id),
                id_map.get(&relation.target_temp_id),
            ) else {
                tracing::debug!(
                    source = relation.source_temp_id,
                    target = relation.target_temp_id,
                    "dropping relation with unmapped endpoint"
                );
                continue;
            };
            if source == target {
                continue;
            }
            self.graph.upsert_relation(
                Relation::new(source.clone(), target.clone(), relation.relation_type)
                    .with_confidence(relation.confidence)
                    .with_source_chunk(chunk_id),
            )?;
            written += 1;
        }
        Ok(written)
    }

    fn upsert_embedding(&self, id: &EntityId, mention: &ExtractedEntity) {
        let (Some(vectors), Some(embedder)) = (&self.vectors, &self.embedder) else {
            return;
        };
        let text = if mention.description.is_empty() {
            mention.name.clone()
        } else {
            format!("{}: {}", mention.name, mention.description)
        };
        match embedder.embed(&text) {
            Ok(vector) => {
                let payload = VectorPayload {
                    name: mention.name.clone(),
                    entity_type: mention.entity_type.as_str().to_string(),
                };
                if let Err(e) = vectors.upsert(id, &vector, payload) {
                    tracing::warn!(entity = id.as_str(), error = %e, "vector upsert failed");
                }
            },
            Err(e) => {
                tracing::warn!(entity = id.as_str(), error = %e, "embedding failed");
            },
        }
    }
}
