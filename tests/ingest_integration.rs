//! End-to-end ingestion: extraction, merge, idempotence.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{MockLlm, TEST_DIMENSIONS, gpt4_ingestion_llm};
use std::collections::BTreeSet;
use std::sync::Arc;
use yagokoro::ingest::{
    EntityExtractor, ExtractorOptions, GraphMerger, IngestionPipeline, PipelineOptions,
    RelationExtractor, RelationExtractorOptions,
};
use yagokoro::llm::LlmClient;
use yagokoro::models::{EntityType, RelationType, TextChunk};
use yagokoro::storage::{
    GraphStore, InMemoryChunkStore, InMemoryGraphStore, InMemoryVectorStore, VectorStore,
};

fn build_pipeline(
    graph: Arc<InMemoryGraphStore>,
    vectors: Arc<InMemoryVectorStore>,
    llm: Arc<MockLlm>,
) -> IngestionPipeline {
    IngestionPipeline::new(
        EntityExtractor::new(llm.clone() as Arc<dyn LlmClient>, ExtractorOptions::default()),
        RelationExtractor::new(
            llm.clone() as Arc<dyn LlmClient>,
            RelationExtractorOptions::default(),
        ),
        GraphMerger::new(graph as Arc<dyn GraphStore>)
            .with_vectors(vectors as Arc<dyn VectorStore>, llm as Arc<dyn LlmClient>),
        PipelineOptions::default(),
    )
}

fn gpt4_chunk() -> TextChunk {
    TextChunk::new(
        "chunk-1",
        "GPT-4 is a large language model developed by OpenAI.",
    )
}

#[test]
fn ingest_extracts_entities_and_relation() {
    let graph = Arc::new(InMemoryGraphStore::new());
    let vectors = Arc::new(InMemoryVectorStore::new(TEST_DIMENSIONS));
    let pipeline = build_pipeline(Arc::clone(&graph), Arc::clone(&vectors), gpt4_ingestion_llm());

    let status = pipeline.ingest_document("doc-1", &[gpt4_chunk()]);
    assert!(status.is_clean(), "errors: {:?}", status.errors);
    assert_eq!(status.entities_merged, 2);
    assert_eq!(status.relations_merged, 1);

    let gpt4 = graph
        .find_by_type_name(EntityType::AiModel, "GPT-4")
        .unwrap()
        .expect("GPT-4 entity");
    let openai = graph
        .find_by_type_name(EntityType::Organization, "OpenAI")
        .unwrap()
        .expect("OpenAI entity");

    let relations = graph.relations_of(&gpt4.id).unwrap();
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].relation_type, RelationType::DevelopedBy);
    assert_eq!(relations[0].target_id, openai.id);
    assert!(relations[0].confidence >= 0.9);

    // Provenance points back at the ingested chunk.
    assert!(gpt4.source_chunks.contains("chunk-1"));
    // Embeddings were written for both entities.
    assert_eq!(vectors.count().unwrap(), 2);
}

#[test]
fn ingesting_the_same_chunk_twice_is_idempotent() {
    let graph = Arc::new(InMemoryGraphStore::new());
    let vectors = Arc::new(InMemoryVectorStore::new(TEST_DIMENSIONS));
    let pipeline = build_pipeline(Arc::clone(&graph), vectors, gpt4_ingestion_llm());

    pipeline.ingest_document("doc-1", &[gpt4_chunk()]);
    let gpt4_before = graph
        .find_by_type_name(EntityType::AiModel, "GPT-4")
        .unwrap()
        .expect("GPT-4 entity");
    let edges_before: BTreeSet<_> = graph
        .relations_of(&gpt4_before.id)
        .unwrap()
        .into_iter()
        .map(|r| r.key())
        .collect();

    pipeline.ingest_document("doc-1", &[gpt4_chunk()]);
    let gpt4_after = graph
        .find_by_type_name(EntityType::AiModel, "GPT-4")
        .unwrap()
        .expect("GPT-4 entity");
    let edges_after: BTreeSet<_> = graph
        .relations_of(&gpt4_after.id)
        .unwrap()
        .into_iter()
        .map(|r| r.key())
        .collect();

    // Same entity set, same edge set, max confidence, unioned provenance.
    assert_eq!(graph.stats().unwrap().entity_count, 2);
    assert_eq!(edges_before, edges_after);
    assert_eq!(gpt4_before.id, gpt4_after.id);
    assert!((gpt4_after.confidence - gpt4_before.confidence).abs() < f32::EPSILON);
    assert_eq!(gpt4_before.source_chunks, gpt4_after.source_chunks);
}

#[test]
fn chunk_store_retains_ingested_chunks() {
    let graph = Arc::new(InMemoryGraphStore::new());
    let vectors = Arc::new(InMemoryVectorStore::new(TEST_DIMENSIONS));
    let chunks = Arc::new(InMemoryChunkStore::new());
    let pipeline = build_pipeline(graph, vectors, gpt4_ingestion_llm())
        .with_chunk_store(chunks.clone() as Arc<dyn yagokoro::storage::ChunkStore>);

    pipeline.ingest_document("doc-1", &[gpt4_chunk()]);
    assert!(
        yagokoro::storage::ChunkStore::get(chunks.as_ref(), "chunk-1")
            .unwrap()
            .is_some()
    );
}

#[test]
fn invalid_relation_json_keeps_entities() {
    let llm = Arc::new(MockLlm::new(|system, _| {
        if system.contains("extract typed entities") {
            Ok(r#"{"entities": [
                {"temp_id": "e1", "name": "GPT-4", "type": "ai_model", "confidence": 0.9},
                {"temp_id": "e2", "name": "OpenAI", "type": "organization", "confidence": 0.9}
            ]}"#
                .to_string())
        } else {
            Ok("this is not json at all".to_string())
        }
    }));
    let graph = Arc::new(InMemoryGraphStore::new());
    let vectors = Arc::new(InMemoryVectorStore::new(TEST_DIMENSIONS));
    let pipeline = build_pipeline(Arc::clone(&graph), vectors, llm);

    let status = pipeline.ingest_document("doc-1", &[gpt4_chunk()]);
    // The relation stage failed, but the entities stay merged.
    assert!(!status.is_clean());
    assert_eq!(status.entities_merged, 2);
    assert_eq!(graph.stats().unwrap().entity_count, 2);
    assert_eq!(graph.stats().unwrap().relation_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_batch_converges_to_one_graph() {
    let graph = Arc::new(InMemoryGraphStore::new());
    let vectors = Arc::new(InMemoryVectorStore::new(TEST_DIMENSIONS));
    let pipeline = Arc::new(build_pipeline(
        Arc::clone(&graph),
        vectors,
        gpt4_ingestion_llm(),
    ));

    let documents: Vec<(String, Vec<TextChunk>)> = (0..10)
        .map(|i| {
            (
                format!("doc-{i}"),
                vec![TextChunk::new(
                    format!("chunk-{i}"),
                    "GPT-4 is a large language model developed by OpenAI.",
                )],
            )
        })
        .collect();
    let statuses = pipeline.ingest_batch(documents).await;

    assert_eq!(statuses.len(), 10);
    assert!(statuses.iter().all(yagokoro::ingest::DocumentStatus::is_clean));
    // Concurrent ingestion respects the (type, name) uniqueness invariant.
    let stats = graph.stats().unwrap();
    assert_eq!(stats.entity_count, 2);
    assert_eq!(stats.relation_count, 1);

    // Provenance is the union of every document's chunks.
    let gpt4 = graph
        .find_by_type_name(EntityType::AiModel, "gpt-4")
        .unwrap()
        .expect("GPT-4 entity");
    assert_eq!(gpt4.source_chunks.len(), 10);
}
