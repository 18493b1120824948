//! Local (entity-centric) search.
//!
//! Resolves seed entities from the query by vector similarity and exact
//! name match, expands their neighbourhood by a bounded hop depth, and
//! generates an answer grounded in the collected context.

use crate::llm::{ChatMessage, ChatOptions, LlmClient};
use crate::models::{
    Citation, CitationSource, EntityId, QueryContext, QueryMetrics, QueryResponse, QueryType,
    SearchMode, normalize_name,
};
use crate::query::semantic::SemanticIndex;
use crate::storage::{ChunkStore, GraphStore};
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

const ANSWER_SYSTEM_PROMPT: &str = r#"You answer questions about research literature using ONLY the provided context.
Cite entities by name. Never introduce entity names that are absent from the context.
If the context cannot answer the question, say so."#;

/// Options for local search.
#[derive(Debug, Clone)]
pub struct LocalSearchOptions {
    /// Cap on resolved seed entities.
    pub max_entities: usize,
    /// Neighbourhood expansion depth.
    pub hop_depth: usize,
    /// Minimum vector similarity for seed resolution.
    pub min_similarity: f32,
    /// How seeds are retrieved.
    pub search_mode: SearchMode,
}

impl Default for LocalSearchOptions {
    fn default() -> Self {
        Self {
            max_entities: 20,
            hop_depth: 2,
            min_similarity: 0.5,
            search_mode: SearchMode::Hybrid,
        }
    }
}

/// Entity-neighbourhood search engine.
pub struct LocalSearchEngine {
    graph: Arc<dyn GraphStore>,
    semantic: Arc<SemanticIndex>,
    chunks: Option<Arc<dyn ChunkStore>>,
    llm: Arc<dyn LlmClient>,
    options: LocalSearchOptions,
}

impl LocalSearchEngine {
    /// Creates a local search engine.
    #[must_use]
    pub fn new(
        graph: Arc<dyn GraphStore>,
        semantic: Arc<SemanticIndex>,
        llm: Arc<dyn LlmClient>,
        options: LocalSearchOptions,
    ) -> Self {
        Self {
            graph,
            semantic,
            chunks: None,
            llm,
            options,
        }
    }

    /// Attaches a chunk repository for context assembly.
    #[must_use]
    pub fn with_chunk_store(mut self, chunks: Arc<dyn ChunkStore>) -> Self {
        self.chunks = Some(chunks);
        self
    }

    /// Runs a local search.
    ///
    /// # Errors
    ///
    /// Returns an error if seed resolution, expansion, or generation fails.
    pub fn search(&self, query: &str) -> Result<QueryResponse> {
        let retrieval_started = Instant::now();

        // (i) seed resolution, (ii) expansion, (iii) context assembly.
        let seeds = self.resolve_seeds(query)?;
        let context = self.expand(&seeds)?;
        let retrieval_ms =
            u64::try_from(retrieval_started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if context.entities.is_empty() {
            let mut response = QueryResponse::ok(
                query,
                "No matching entities were found in the knowledge graph.",
                QueryType::Local,
            );
            response.metrics.retrieval_ms = retrieval_ms;
            return Ok(response);
        }

        // (iv) answer generation from the assembled context.
        let generation_started = Instant::now();
        let (answer, tokens) = self.generate_answer(query, &context)?;

        let mut response = QueryResponse::ok(query, answer, QueryType::Local);
        response.metrics = QueryMetrics {
            retrieval_ms,
            generation_ms: u64::try_from(generation_started.elapsed().as_millis())
                .unwrap_or(u64::MAX),
            entities: context.entities.len(),
            relations: context.relations.len(),
            communities: 0,
            tokens,
        };

        // (v) entity citations, deterministically ordered.
        response.citations = context
            .entities
            .iter()
            .map(|entity| {
                let relevance = seeds
                    .get(&entity.id)
                    .copied()
                    .unwrap_or(0.3);
                Citation::new(
                    entity.id.as_str(),
                    entity.name.clone(),
                    CitationSource::Entity,
                    relevance,
                )
            })
            .collect();
        response.context = context;
        response.finalize_citations();

        #[allow(clippy::cast_precision_loss)]
        metrics::histogram!("yagokoro_local_search_ms").record(retrieval_ms as f64);
        Ok(response)
    }

    /// Resolves seed entities with their relevance scores.
    fn resolve_seeds(&self, query: &str) -> Result<BTreeMap<EntityId, f32>> {
        let mut seeds: BTreeMap<EntityId, f32> = BTreeMap::new();

        if self.options.search_mode != SearchMode::Keyword {
            for hit in self.semantic.search_text(
                query,
                self.options.max_entities,
                self.options.min_similarity,
            )? {
                seeds
                    .entry(hit.id)
                    .and_modify(|s| *s = s.max(hit.score))
                    .or_insert(hit.score);
            }
        }

        if self.options.search_mode != SearchMode::Semantic {
            let normalized_query = normalize_name(query);
            for entity in self.graph.all_entities()? {
                let name = entity.normalized_name();
                if name.chars().count() >= 3 && normalized_query.contains(&name) {
                    seeds
                        .entry(entity.id.clone())
                        .and_modify(|s| *s = s.max(1.0))
                        .or_insert(1.0);
                }
            }
        }

        // Keep the strongest seeds up to the cap.
        if seeds.len() > self.options.max_entities {
            let mut ranked: Vec<(EntityId, f32)> = seeds.into_iter().collect();
            ranked.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            ranked.truncate(self.options.max_entities);
            seeds = ranked.into_iter().collect();
        }
        Ok(seeds)
    }

    /// Expands seeds by `hop_depth` hops and assembles the context.
    fn expand(&self, seeds: &BTreeMap<EntityId, f32>) -> Result<QueryContext> {
        let mut context = QueryContext::default();
        let mut seen_entities: BTreeSet<EntityId> = BTreeSet::new();
        let mut seen_relations = BTreeSet::new();
        let mut chunk_ids: BTreeSet<String> = BTreeSet::new();

        for seed in seeds.keys() {
            let traversal = self.graph.neighbours(seed, self.options.hop_depth, None)?;
            for entity in traversal.entities {
                if seen_entities.insert(entity.id.clone()) {
                    chunk_ids.extend(entity.source_chunks.iter().cloned());
                    context.entities.push(entity);
                }
            }
            for relation in traversal.relations {
                if seen_relations.insert(relation.key()) {
                    chunk_ids.extend(relation.source_chunks.iter().cloned());
                    context.relations.push(relation);
                }
            }
        }

        if let Some(chunks) = &self.chunks {
            let ids: Vec<String> = chunk_ids.into_iter().collect();
            context.text_chunks = chunks.get_many(&ids)?;
        }
        Ok(context)
    }

    fn generate_answer(&self, query: &str, context: &QueryContext) -> Result<(String, u32)> {
        let user = format!(
            "Context:\n{}\nQuestion: {query}",
            render_context(context)
        );
        let response = self.llm.chat(
            &[
                ChatMessage::system(ANSWER_SYSTEM_PROMPT),
                ChatMessage::user(user),
            ],
            &ChatOptions::default(),
        )?;
        Ok((response.content, response.usage.total_tokens))
    }
}

/// Renders a context block for answer prompts.
#[must_use]
pub fn render_context(context: &QueryContext) -> String {
    let mut out = String::new();
    if !context.entities.is_empty() {
        out.push_str("Entities:\n");
        for entity in &context.entities {
            out.push_str(&format!(
                "- [{}] {} ({})",
                entity.id, entity.name, entity.entity_type
            ));
            if !entity.description.is_empty() {
                out.push_str(&format!(": {}", entity.description));
            }
            out.push('\n');
        }
    }
    if !context.relations.is_empty() {
        out.push_str("Relations:\n");
        for relation in &context.relations {
            out.push_str(&format!(
                "- {} -[{}]-> {}\n",
                relation.source_id, relation.relation_type, relation.target_id
            ));
        }
    }
    if !context.community_summaries.is_empty() {
        out.push_str("Community summaries:\n");
        for summary in &context.community_summaries {
            out.push_str(&format!("- {summary}\n"));
        }
    }
    if !context.text_chunks.is_empty() {
        out.push_str("Sources:\n");
        for chunk in &context.text_chunks {
            out.push_str(&format!("- [{}] {}\n", chunk.id, chunk.excerpt(240)));
        }
    }
    out
}
