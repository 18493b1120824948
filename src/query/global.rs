//! Global (community-centric) search.
//!
//! Ranks communities at a chosen level by the similarity of the query
//! against each community summary, then map-reduces: partial answers are
//! generated per batch of summaries and reduced into a single answer with
//! community citations.

use crate::community::CommunityPersister;
use crate::llm::{ChatMessage, ChatOptions, LlmClient};
use crate::models::{
    Citation, CitationSource, Community, QueryContext, QueryMetrics, QueryResponse, QueryType,
};
use crate::query::semantic::SemanticIndex;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;

const MAP_SYSTEM_PROMPT: &str = r#"You answer a question from research-community summaries.
Using ONLY the provided summaries, write a short partial answer. If the
summaries are irrelevant to the question, reply exactly: IRRELEVANT"#;

const REDUCE_SYSTEM_PROMPT: &str = r#"You combine partial answers into one final answer.
Merge the partial answers below into a single coherent response to the
question. Do not introduce information absent from the partial answers."#;

/// Options for global search.
#[derive(Debug, Clone)]
pub struct GlobalSearchOptions {
    /// Hierarchy level whose communities are ranked.
    pub community_level: u32,
    /// Cap on communities consulted.
    pub max_communities: usize,
    /// Communities per map batch.
    pub batch_size: usize,
}

impl Default for GlobalSearchOptions {
    fn default() -> Self {
        Self {
            community_level: 0,
            max_communities: 10,
            batch_size: 5,
        }
    }
}

/// Community-summary search engine.
pub struct GlobalSearchEngine {
    persister: CommunityPersister,
    semantic: Arc<SemanticIndex>,
    llm: Arc<dyn LlmClient>,
    options: GlobalSearchOptions,
}

impl GlobalSearchEngine {
    /// Creates a global search engine.
    #[must_use]
    pub fn new(
        persister: CommunityPersister,
        semantic: Arc<SemanticIndex>,
        llm: Arc<dyn LlmClient>,
        options: GlobalSearchOptions,
    ) -> Self {
        Self {
            persister,
            semantic,
            llm,
            options,
        }
    }

    /// Runs a global search.
    ///
    /// # Errors
    ///
    /// Returns an error if community loading, ranking, or generation fails.
    pub fn search(&self, query: &str) -> Result<QueryResponse> {
        let retrieval_started = Instant::now();
        let ranked = self.rank_communities(query)?;
        let retrieval_ms =
            u64::try_from(retrieval_started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if ranked.is_empty() {
            let mut response = QueryResponse::ok(
                query,
                "No community summaries are available; run community detection first.",
                QueryType::Global,
            );
            response.metrics.retrieval_ms = retrieval_ms;
            return Ok(response);
        }

        let generation_started = Instant::now();
        let (answer, tokens) = self.map_reduce(query, &ranked)?;

        let context = QueryContext {
            community_summaries: ranked
                .iter()
                .filter_map(|(community, _)| community.summary.clone())
                .collect(),
            ..QueryContext::default()
        };

        let mut response = QueryResponse::ok(query, answer, QueryType::Global);
        response.citations = ranked
            .iter()
            .map(|(community, score)| {
                Citation::new(
                    community.id.as_str(),
                    community
                        .summary
                        .clone()
                        .unwrap_or_else(|| community.id.as_str().to_string()),
                    CitationSource::Community,
                    *score,
                )
            })
            .collect();
        response.metrics = QueryMetrics {
            retrieval_ms,
            generation_ms: u64::try_from(generation_started.elapsed().as_millis())
                .unwrap_or(u64::MAX),
            entities: 0,
            relations: 0,
            communities: ranked.len(),
            tokens,
        };
        response.context = context;
        response.finalize_citations();
        Ok(response)
    }

    /// Ranks summarised communities at the configured level.
    fn rank_communities(&self, query: &str) -> Result<Vec<(Community, f32)>> {
        let communities = self.persister.load_layer()?;
        let mut ranked: Vec<(Community, f32)> = Vec::new();
        for community in communities {
            if community.level != self.options.community_level {
                continue;
            }
            let Some(summary) = &community.summary else {
                continue;
            };
            let score = self.semantic.similarity(query, summary)?;
            ranked.push((community, score));
        }
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        ranked.truncate(self.options.max_communities);
        Ok(ranked)
    }

    /// Map: partial answer per summary batch. Reduce: combine partials.
    fn map_reduce(&self, query: &str, ranked: &[(Community, f32)]) -> Result<(String, u32)> {
        let mut partials = Vec::new();
        let mut tokens = 0_u32;

        for batch in ranked.chunks(self.options.batch_size.max(1)) {
            let summaries: String = batch
                .iter()
                .filter_map(|(community, _)| {
                    community
                        .summary
                        .as_ref()
                        .map(|s| format!("- [{}] {s}\n", community.id))
                })
                .collect();
            let response = self.llm.chat(
                &[
                    ChatMessage::system(MAP_SYSTEM_PROMPT),
                    ChatMessage::user(format!("Summaries:\n{summaries}\nQuestion: {query}")),
                ],
                &ChatOptions::default(),
            )?;
            tokens = tokens.saturating_add(response.usage.total_tokens);
            let partial = response.content.trim().to_string();
            if !partial.is_empty() && partial != "IRRELEVANT" {
                partials.push(partial);
            }
        }

        if partials.is_empty() {
            return Ok((
                "The available community summaries do not cover this question.".to_string(),
                tokens,
            ));
        }
        if partials.len() == 1 {
            return Ok((partials.remove(0), tokens));
        }

        let joined: String = partials
            .iter()
            .enumerate()
            .map(|(i, p)| format!("Partial {}:\n{p}\n\n", i + 1))
            .collect();
        let response = self.llm.chat(
            &[
                ChatMessage::system(REDUCE_SYSTEM_PROMPT),
                ChatMessage::user(format!("{joined}Question: {query}")),
            ],
            &ChatOptions::default(),
        )?;
        tokens = tokens.saturating_add(response.usage.total_tokens);
        Ok((response.content, tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = GlobalSearchOptions::default();
        assert_eq!(options.community_level, 0);
        assert_eq!(options.max_communities, 10);
        assert_eq!(options.batch_size, 5);
    }
}
