//! Hybrid search: concurrent local + global retrieval.
//!
//! Both branches always run; the engine fails open. If exactly one branch
//! succeeds its answer is returned; if both succeed the contexts merge and
//! the answers are synthesized; only when both fail does the caller see a
//! failure response.

use crate::llm::{ChatMessage, ChatOptions, LlmClient};
use crate::models::{CitationSource, QueryResponse, QueryType};
use crate::query::global::GlobalSearchEngine;
use crate::query::local::LocalSearchEngine;
use crate::Result;
use std::collections::BTreeSet;
use std::sync::Arc;

const SYNTHESIS_SYSTEM_PROMPT: &str = r#"You merge two answers to the same question: one from entity-level
retrieval and one from community-level retrieval. Produce one coherent
answer without introducing new information."#;

/// Options for hybrid search.
#[derive(Debug, Clone)]
pub struct HybridSearchOptions {
    /// Scale applied to entity-citation relevances.
    pub local_weight: f32,
    /// Scale applied to community-citation relevances.
    pub global_weight: f32,
}

impl Default for HybridSearchOptions {
    fn default() -> Self {
        Self {
            local_weight: 0.5,
            global_weight: 0.5,
        }
    }
}

/// Concurrent local + global search engine.
pub struct HybridSearchEngine {
    local: Arc<LocalSearchEngine>,
    global: Arc<GlobalSearchEngine>,
    llm: Arc<dyn LlmClient>,
    options: HybridSearchOptions,
}

impl HybridSearchEngine {
    /// Creates a hybrid engine over the two sub-engines.
    #[must_use]
    pub fn new(
        local: Arc<LocalSearchEngine>,
        global: Arc<GlobalSearchEngine>,
        llm: Arc<dyn LlmClient>,
        options: HybridSearchOptions,
    ) -> Self {
        Self {
            local,
            global,
            llm,
            options,
        }
    }

    /// Runs both branches concurrently and merges the results.
    pub async fn search(&self, query: &str) -> QueryResponse {
        let local_engine = Arc::clone(&self.local);
        let global_engine = Arc::clone(&self.global);
        let local_query = query.to_string();
        let global_query = query.to_string();

        let (local_joined, global_joined) = tokio::join!(
            tokio::task::spawn_blocking(move || local_engine.search(&local_query)),
            tokio::task::spawn_blocking(move || global_engine.search(&global_query)),
        );

        let local = flatten_branch(local_joined, "local");
        let global = flatten_branch(global_joined, "global");

        match (local, global) {
            (Ok(local), Ok(global)) => self.merge(query, local, global),
            (Ok(mut only), Err(e)) | (Err(e), Ok(mut only)) => {
                tracing::warn!(error = %e, "hybrid branch failed; failing open");
                only.query_type = QueryType::Hybrid;
                self.scale_citations(&mut only);
                only
            },
            (Err(local_err), Err(global_err)) => QueryResponse::failure(
                query,
                QueryType::Hybrid,
                format!("local: {local_err}; global: {global_err}"),
            ),
        }
    }

    /// Merges two successful branch responses.
    fn merge(
        &self,
        query: &str,
        mut local: QueryResponse,
        global: QueryResponse,
    ) -> QueryResponse {
        let answer = self
            .synthesize(query, &local.answer, &global.answer)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "synthesis failed; concatenating answers");
                format!("{}\n\n{}", local.answer, global.answer)
            });

        let mut response = QueryResponse::ok(query, answer, QueryType::Hybrid);

        // Merge contexts; text chunks from both sides, deduplicated by ID.
        let mut chunk_ids: BTreeSet<String> = BTreeSet::new();
        response.context.entities = std::mem::take(&mut local.context.entities);
        response.context.relations = std::mem::take(&mut local.context.relations);
        response.context.community_summaries = global.context.community_summaries.clone();
        for chunk in local
            .context
            .text_chunks
            .drain(..)
            .chain(global.context.text_chunks.iter().cloned())
        {
            if chunk_ids.insert(chunk.id.clone()) {
                response.context.text_chunks.push(chunk);
            }
        }

        response.citations = local
            .citations
            .into_iter()
            .chain(global.citations)
            .collect();
        self.scale_citations(&mut response);

        response.metrics.retrieval_ms = local
            .metrics
            .retrieval_ms
            .max(global.metrics.retrieval_ms);
        response.metrics.generation_ms = local
            .metrics
            .generation_ms
            .saturating_add(global.metrics.generation_ms);
        response.metrics.entities = response.context.entities.len();
        response.metrics.relations = response.context.relations.len();
        response.metrics.communities = global.metrics.communities;
        response.metrics.tokens = local
            .metrics
            .tokens
            .saturating_add(global.metrics.tokens);
        response
    }

    /// Scales citation relevances by the configured branch weights.
    fn scale_citations(&self, response: &mut QueryResponse) {
        for citation in &mut response.citations {
            let weight = match citation.source_type {
                CitationSource::Entity | CitationSource::Document => self.options.local_weight,
                CitationSource::Community => self.options.global_weight,
            };
            citation.relevance = (citation.relevance * weight).clamp(0.0, 1.0);
        }
        response.finalize_citations();
    }

    fn synthesize(&self, query: &str, local: &str, global: &str) -> Result<String> {
        let user = format!(
            "Question: {query}\n\nEntity-level answer:\n{local}\n\nCommunity-level answer:\n{global}"
        );
        let response = self.llm.chat(
            &[
                ChatMessage::system(SYNTHESIS_SYSTEM_PROMPT),
                ChatMessage::user(user),
            ],
            &ChatOptions::default(),
        )?;
        Ok(response.content)
    }
}

fn flatten_branch(
    joined: std::result::Result<Result<QueryResponse>, tokio::task::JoinError>,
    branch: &str,
) -> Result<QueryResponse> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(crate::Error::Fatal(format!("{branch} branch panicked: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let options = HybridSearchOptions::default();
        assert!((options.local_weight - 0.5).abs() < f32::EPSILON);
        assert!((options.global_weight - 0.5).abs() < f32::EPSILON);
    }
}
