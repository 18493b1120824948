//! Document ingestion pipeline.
//!
//! Within one document the stages run strictly in order: entity extraction,
//! entity merge, relation extraction, relation merge. Across documents
//! ingestion fans out over tokio tasks bounded by a semaphore. A relation
//! failure after entity merge keeps the entities (they are independently
//! useful) and records the error on the per-document status.

use crate::ingest::entity_extractor::EntityExtractor;
use crate::ingest::merge::GraphMerger;
use crate::ingest::relation_extractor::RelationExtractor;
use crate::models::TextChunk;
use crate::Result;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Options for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Concurrent document bound for batch ingestion.
    pub max_concurrent_documents: usize,
    /// Per-document deadline for batch ingestion; `None` means unbounded.
    /// An expired document is abandoned with its partial writes in place
    /// (merges are idempotent, so re-ingestion converges).
    pub document_deadline_ms: Option<u64>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_concurrent_documents: 5,
            document_deadline_ms: None,
        }
    }
}

/// Per-document ingestion outcome.
#[derive(Debug, Clone, Default)]
pub struct DocumentStatus {
    /// The ingested document ID.
    pub document_id: String,
    /// Chunks processed.
    pub chunks_processed: usize,
    /// Entities merged into the graph.
    pub entities_merged: usize,
    /// Relations merged into the graph.
    pub relations_merged: usize,
    /// Per-chunk errors; entities already merged stay in place.
    pub errors: Vec<String>,
}

impl DocumentStatus {
    /// Whether every chunk ingested cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Outcome of one chunk; a relation-stage failure leaves the merged
/// entities in place.
struct ChunkOutcome {
    entities: usize,
    relations: usize,
    relation_error: Option<String>,
}

/// Orchestrates extraction and merge for documents.
pub struct IngestionPipeline {
    entity_extractor: Arc<EntityExtractor>,
    relation_extractor: Arc<RelationExtractor>,
    merger: Arc<GraphMerger>,
    chunk_store: Option<Arc<dyn crate::storage::ChunkStore>>,
    options: PipelineOptions,
}

impl IngestionPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(
        entity_extractor: EntityExtractor,
        relation_extractor: RelationExtractor,
        merger: GraphMerger,
        options: PipelineOptions,
    ) -> Self {
        Self {
            entity_extractor: Arc::new(entity_extractor),
            relation_extractor: Arc::new(relation_extractor),
            merger: Arc::new(merger),
            chunk_store: None,
            options,
        }
    }

    /// Retains ingested chunks in a repository for context assembly.
    #[must_use]
    pub fn with_chunk_store(mut self, chunk_store: Arc<dyn crate::storage::ChunkStore>) -> Self {
        self.chunk_store = Some(chunk_store);
        self
    }

    /// Ingests one document's chunks sequentially.
    ///
    /// Never fails as a whole: per-chunk errors are captured on the status
    /// so a batch continues.
    #[must_use]
    pub fn ingest_document(&self, document_id: &str, chunks: &[TextChunk]) -> DocumentStatus {
        let mut status = DocumentStatus {
            document_id: document_id.to_string(),
            ..DocumentStatus::default()
        };

        for chunk in chunks {
            match self.ingest_chunk(chunk) {
                Ok(outcome) => {
                    status.chunks_processed += 1;
                    status.entities_merged += outcome.entities;
                    status.relations_merged += outcome.relations;
                    if let Some(error) = outcome.relation_error {
                        // Entities from this chunk are retained; only the
                        // relation stage failed.
                        status.errors.push(format!("{}: {error}", chunk.id));
                    }
                },
                Err(e) => {
                    tracing::warn!(chunk = chunk.id, error = %e, "chunk ingestion failed");
                    status.errors.push(format!("{}: {e}", chunk.id));
                },
            }
        }

        metrics::counter!("yagokoro_documents_ingested").increment(1);
        status
    }

    /// Ingests a single chunk: entities before relations, always.
    fn ingest_chunk(&self, chunk: &TextChunk) -> Result<ChunkOutcome> {
        if let Some(chunk_store) = &self.chunk_store {
            chunk_store.insert(chunk.clone())?;
        }
        let extraction = self.entity_extractor.extract(chunk)?;
        let id_map = self.merger.merge_entities(&chunk.id, &extraction.entities)?;

        // Entities are already durable here; a relation failure below must
        // not roll them back.
        let mut outcome = ChunkOutcome {
            entities: id_map.len(),
            relations: 0,
            relation_error: None,
        };
        match self
            .relation_extractor
            .extract(chunk, &extraction.entities)
            .and_then(|rel| self.merger.merge_relations(&chunk.id, &rel.relations, &id_map))
        {
            Ok(written) => outcome.relations = written,
            Err(e) => outcome.relation_error = Some(e.to_string()),
        }
        Ok(outcome)
    }

    /// Ingests a batch of documents in parallel, bounded by
    /// `max_concurrent_documents`.
    ///
    /// Returns a status per document in completion order. Per-document
    /// failures are captured on their statuses; the batch always completes.
    pub async fn ingest_batch(
        self: &Arc<Self>,
        documents: Vec<(String, Vec<TextChunk>)>,
    ) -> Vec<DocumentStatus> {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent_documents.max(1)));
        let mut join_set = JoinSet::new();

        let deadline_ms = self.options.document_deadline_ms;
        for (document_id, chunks) in documents {
            let pipeline = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let mut failed = DocumentStatus {
                    document_id: document_id.clone(),
                    ..DocumentStatus::default()
                };
                let Ok(_permit) = semaphore.acquire().await else {
                    failed.errors.push("ingestion semaphore closed".to_string());
                    return failed;
                };
                // Extraction and merge are blocking; keep them off the
                // async workers. On deadline expiry the document is
                // abandoned with its partial writes in place.
                let deadline = deadline_ms.map(crate::observability::Deadline::in_millis);
                let handle = tokio::task::spawn_blocking(move || {
                    pipeline.ingest_document(&document_id, &chunks)
                });
                let joined = match deadline {
                    Some(deadline) => {
                        match tokio::time::timeout(deadline.remaining(), handle).await {
                            Ok(joined) => joined,
                            Err(_) => {
                                failed.errors.push("document deadline exceeded".to_string());
                                return failed;
                            },
                        }
                    },
                    None => handle.await,
                };
                match joined {
                    Ok(status) => status,
                    Err(e) => {
                        failed.errors.push(format!("ingestion task failed: {e}"));
                        failed
                    },
                }
            });
        }

        let mut statuses = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(status) => statuses.push(status),
                Err(e) => tracing::error!(error = %e, "ingestion task panicked"),
            }
        }
        statuses
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ingest::entity_extractor::ExtractorOptions;
    use crate::ingest::relation_extractor::RelationExtractorOptions;
    use crate::storage::{GraphStore, InMemoryGraphStore};

    fn pipeline(graph: Arc<InMemoryGraphStore>) -> Arc<IngestionPipeline> {
        Arc::new(IngestionPipeline::new(
            EntityExtractor::without_llm(ExtractorOptions::default()),
            RelationExtractor::without_llm(RelationExtractorOptions::default()),
            GraphMerger::new(graph as Arc<dyn GraphStore>),
            PipelineOptions::default(),
        ))
    }

    #[test]
    fn test_ingest_document_merges_entities() {
        let graph = Arc::new(InMemoryGraphStore::new());
        let pipeline = pipeline(Arc::clone(&graph));
        let chunks = vec![TextChunk::new(
            "c1",
            "GPT-4 is a large language model developed by OpenAI.",
        )];
        let status = pipeline.ingest_document("doc-1", &chunks);
        assert!(status.is_clean());
        assert_eq!(status.chunks_processed, 1);
        assert!(status.entities_merged >= 2);
        assert!(graph.stats().unwrap().entity_count >= 2);
    }

    #[test]
    fn test_reingestion_is_idempotent() {
        let graph = Arc::new(InMemoryGraphStore::new());
        let pipeline = pipeline(Arc::clone(&graph));
        let chunks = vec![TextChunk::new("c1", "GPT-4 from OpenAI.")];
        pipeline.ingest_document("doc-1", &chunks);
        let entities_after_first = graph.stats().unwrap().entity_count;
        pipeline.ingest_document("doc-1", &chunks);
        assert_eq!(graph.stats().unwrap().entity_count, entities_after_first);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_batch_ingestion_completes_all() {
        let graph = Arc::new(InMemoryGraphStore::new());
        let pipeline = pipeline(Arc::clone(&graph));
        let documents: Vec<(String, Vec<TextChunk>)> = (0..8)
            .map(|i| {
                (
                    format!("doc-{i}"),
                    vec![TextChunk::new(
                        format!("c{i}"),
                        "BERT was developed at Google.",
                    )],
                )
            })
            .collect();
        let statuses = pipeline.ingest_batch(documents).await;
        assert_eq!(statuses.len(), 8);
        assert!(statuses.iter().all(DocumentStatus::is_clean));
        // Same entities across documents merge into one graph node each.
        assert_eq!(graph.stats().unwrap().entity_count, 2);
    }
}
