//! Lazy-budget retrieval core.
//!
//! Answers a query while spending at most `Z` LLM relevance tests. The
//! query expands into sub-queries aimed at distinct concept clusters,
//! candidate chunks come from the concept graph's reverse indexes, each
//! candidate costs one budgeted assessor call, claims are extracted from
//! survivors, and the generator produces the answer from the claims.
//!
//! The assessor and generator may be different model endpoints with
//! different cost profiles.

use crate::ingest::concept_extractor::query_tokens;
use crate::llm::{ChatMessage, ChatOptions, LlmClient, extract_json_from_response};
use crate::models::ConceptGraph;
use crate::storage::ChunkStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const EXPAND_SYSTEM_PROMPT: &str = r#"You expand a research question into focused sub-queries.
Return ONLY a JSON array of strings. Each sub-query should target a
distinct aspect or concept cluster of the question."#;

const ASSESS_SYSTEM_PROMPT: &str = r#"You judge whether a text passage is relevant to a question.
Return ONLY a JSON object: {"is_relevant": true, "score": 0.8}"#;

const CLAIMS_SYSTEM_PROMPT: &str = r#"You extract factual claims relevant to a question from a passage.
Return ONLY a JSON array: [{"text": "...", "relevance": 0.9}]"#;

const GENERATE_SYSTEM_PROMPT: &str = r#"You answer a research question from extracted claims.
Ground every statement in the provided claims. If the claims are thin,
answer as well as they allow and say what is missing."#;

/// Budget presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LazyPreset {
    /// Budget 100, 3 sub-queries.
    Z100Lite,
    /// Budget 500, 4 sub-queries.
    Z500,
    /// Budget 1500, 5 sub-queries.
    Z1500,
}

impl LazyPreset {
    /// The relevance-test budget `Z`.
    #[must_use]
    pub const fn budget(self) -> u32 {
        match self {
            Self::Z100Lite => 100,
            Self::Z500 => 500,
            Self::Z1500 => 1500,
        }
    }

    /// Number of sub-queries the expansion stage requests.
    #[must_use]
    pub const fn subquery_count(self) -> usize {
        match self {
            Self::Z100Lite => 3,
            Self::Z500 => 4,
            Self::Z1500 => 5,
        }
    }
}

/// Options for the lazy engine.
#[derive(Debug, Clone)]
pub struct LazyOptions {
    /// Relevance-test budget.
    pub budget: u32,
    /// Sub-queries requested from expansion.
    pub subquery_count: usize,
    /// Assessor score below which a chunk is discarded.
    pub relevance_threshold: f32,
    /// Candidate cap per sub-query before assessment.
    pub max_candidates_per_subquery: usize,
}

impl Default for LazyOptions {
    fn default() -> Self {
        Self::from_preset(LazyPreset::Z500)
    }
}

impl LazyOptions {
    /// Builds options from a preset.
    #[must_use]
    pub const fn from_preset(preset: LazyPreset) -> Self {
        Self {
            budget: preset.budget(),
            subquery_count: preset.subquery_count(),
            relevance_threshold: 0.5,
            max_candidates_per_subquery: 25,
        }
    }
}

/// One budgeted assessor verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceAssessment {
    /// Assessed chunk.
    pub chunk_id: String,
    /// Whether the assessor found it relevant.
    pub is_relevant: bool,
    /// Assessor score in [0, 1].
    pub score: f32,
}

/// A claim extracted from a relevant chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim text.
    pub text: String,
    /// Relevance to the query in [0, 1].
    pub relevance: f32,
    /// Chunk the claim came from.
    pub chunk_id: String,
}

/// A lazy-engine response with budget accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LazyResponse {
    /// The original query.
    pub query: String,
    /// Generated answer; best-effort even when every test was negative.
    pub answer: String,
    /// Sub-queries used for candidate search.
    pub subqueries: Vec<String>,
    /// Claims the answer was generated from.
    pub claims: Vec<Claim>,
    /// Chunk IDs whose claims were used.
    pub sources: Vec<String>,
    /// Relevance tests spent; always `<=` the configured budget.
    pub relevance_tests_used: u32,
    /// `budget - relevance_tests_used`.
    pub budget_remaining: u32,
}

#[derive(Deserialize)]
struct WireAssessment {
    #[serde(default)]
    is_relevant: bool,
    #[serde(default)]
    score: f32,
}

#[derive(Deserialize)]
struct WireClaim {
    text: String,
    #[serde(default = "default_claim_relevance")]
    relevance: f32,
}

const fn default_claim_relevance() -> f32 {
    0.5
}

/// Budgeted lazy retrieval engine.
pub struct LazyQueryEngine {
    assessor: Arc<dyn LlmClient>,
    generator: Arc<dyn LlmClient>,
    concept_graph: ConceptGraph,
    chunks: Arc<dyn ChunkStore>,
    options: LazyOptions,
}

impl LazyQueryEngine {
    /// Creates a lazy engine.
    #[must_use]
    pub fn new(
        assessor: Arc<dyn LlmClient>,
        generator: Arc<dyn LlmClient>,
        concept_graph: ConceptGraph,
        chunks: Arc<dyn ChunkStore>,
        options: LazyOptions,
    ) -> Self {
        Self {
            assessor,
            generator,
            concept_graph,
            chunks,
            options,
        }
    }

    /// Answers a query within the relevance-test budget.
    ///
    /// # Errors
    ///
    /// Returns an error only when the final generation call fails; search
    /// and assessment degrade gracefully.
    pub fn query(&self, query: &str) -> Result<LazyResponse> {
        // Stage 1: expand into sub-queries.
        let subqueries = self.expand(query);

        // Stage 2: candidate chunks via the reverse indexes.
        let candidates = self.search(&subqueries);

        // Stage 3: budgeted assessment.
        let mut tests_used: u32 = 0;
        let mut assessments: Vec<RelevanceAssessment> = Vec::new();
        for chunk_id in &candidates {
            if tests_used >= self.options.budget {
                tracing::debug!(budget = self.options.budget, "relevance budget exhausted");
                break;
            }
            let Ok(Some(chunk)) = self.chunks.get(chunk_id) else {
                continue;
            };
            tests_used += 1;
            assessments.push(self.assess(query, chunk_id, &chunk.content));
        }

        // Stage 4: claim extraction from surviving chunks.
        let mut claims: Vec<Claim> = Vec::new();
        for assessment in &assessments {
            if !assessment.is_relevant || assessment.score < self.options.relevance_threshold {
                continue;
            }
            if let Ok(Some(chunk)) = self.chunks.get(&assessment.chunk_id) {
                claims.extend(self.extract_claims(query, &assessment.chunk_id, &chunk.content));
            }
        }
        claims.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });

        // Stage 5: generation, best-effort when claims are empty.
        let answer = self.generate(query, &claims, &candidates)?;

        let sources: Vec<String> = {
            let mut seen = BTreeSet::new();
            claims
                .iter()
                .filter(|c| seen.insert(c.chunk_id.clone()))
                .map(|c| c.chunk_id.clone())
                .collect()
        };

        Ok(LazyResponse {
            query: query.to_string(),
            answer,
            subqueries,
            claims,
            sources,
            relevance_tests_used: tests_used,
            budget_remaining: self.options.budget.saturating_sub(tests_used),
        })
    }

    /// Expands the query via the generator LLM; falls back to the query
    /// itself on failure.
    fn expand(&self, query: &str) -> Vec<String> {
        let user = format!(
            "Expand into {} sub-queries:\n{query}",
            self.options.subquery_count
        );
        let expanded = self
            .generator
            .chat(
                &[
                    ChatMessage::system(EXPAND_SYSTEM_PROMPT),
                    ChatMessage::user(user),
                ],
                &ChatOptions::deterministic(),
            )
            .ok()
            .and_then(|response| {
                serde_json::from_str::<Vec<String>>(extract_json_from_response(&response.content))
                    .ok()
            });

        match expanded {
            Some(mut subqueries) if !subqueries.is_empty() => {
                subqueries.truncate(self.options.subquery_count);
                subqueries
            },
            _ => vec![query.to_string()],
        }
    }

    /// Ranks candidate chunks: sub-query tokens match concepts directly and
    /// through shared community membership, chunks score by match count.
    fn search(&self, subqueries: &[String]) -> Vec<String> {
        let mut scores: BTreeMap<String, u32> = BTreeMap::new();
        for subquery in subqueries {
            let tokens = query_tokens(subquery);
            let mut matched: BTreeSet<String> = BTreeSet::new();
            for concept in self.concept_graph.concepts.keys() {
                if tokens.iter().any(|t| concept.contains(t.as_str())) {
                    matched.insert(concept.clone());
                }
            }
            // Pull in cluster-mates of matched concepts.
            let mut related: BTreeSet<String> = BTreeSet::new();
            for concept in &matched {
                if let Some(community) = self.concept_graph.community_of(concept) {
                    related.extend(community.keywords.iter().cloned());
                }
            }
            matched.extend(related);

            let mut per_subquery = 0usize;
            for chunk_id in self
                .concept_graph
                .chunks_for_concepts(matched.iter().map(String::as_str))
            {
                if per_subquery >= self.options.max_candidates_per_subquery {
                    break;
                }
                per_subquery += 1;
                *scores.entry(chunk_id).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, u32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.into_iter().map(|(id, _)| id).collect()
    }

    /// One relevance test. Parse failures count against the budget and
    /// score as irrelevant.
    fn assess(&self, query: &str, chunk_id: &str, content: &str) -> RelevanceAssessment {
        let user = format!("Question: {query}\n\nPassage:\n{content}");
        let verdict = self
            .assessor
            .chat(
                &[
                    ChatMessage::system(ASSESS_SYSTEM_PROMPT),
                    ChatMessage::user(user),
                ],
                &ChatOptions::deterministic(),
            )
            .ok()
            .and_then(|response| {
                serde_json::from_str::<WireAssessment>(extract_json_from_response(
                    &response.content,
                ))
                .ok()
            });

        verdict.map_or_else(
            || RelevanceAssessment {
                chunk_id: chunk_id.to_string(),
                is_relevant: false,
                score: 0.0,
            },
            |wire| RelevanceAssessment {
                chunk_id: chunk_id.to_string(),
                is_relevant: wire.is_relevant,
                score: wire.score.clamp(0.0, 1.0),
            },
        )
    }

    fn extract_claims(&self, query: &str, chunk_id: &str, content: &str) -> Vec<Claim> {
        let user = format!("Question: {query}\n\nPassage:\n{content}");
        self.generator
            .chat(
                &[
                    ChatMessage::system(CLAIMS_SYSTEM_PROMPT),
                    ChatMessage::user(user),
                ],
                &ChatOptions::deterministic(),
            )
            .ok()
            .and_then(|response| {
                serde_json::from_str::<Vec<WireClaim>>(extract_json_from_response(
                    &response.content,
                ))
                .ok()
            })
            .unwrap_or_default()
            .into_iter()
            .map(|wire| Claim {
                text: wire.text,
                relevance: wire.relevance.clamp(0.0, 1.0),
                chunk_id: chunk_id.to_string(),
            })
            .collect()
    }

    /// Final generation. With no claims the engine still answers from the
    /// top candidate excerpts.
    fn generate(&self, query: &str, claims: &[Claim], candidates: &[String]) -> Result<String> {
        let material = if claims.is_empty() {
            let mut excerpts = String::from("No assessed claims; candidate excerpts:\n");
            for chunk_id in candidates.iter().take(3) {
                if let Ok(Some(chunk)) = self.chunks.get(chunk_id) {
                    excerpts.push_str(&format!("- {}\n", chunk.excerpt(200)));
                }
            }
            excerpts
        } else {
            claims
                .iter()
                .map(|c| format!("- ({:.2}) {}\n", c.relevance, c.text))
                .collect()
        };

        let response = self.generator.chat(
            &[
                ChatMessage::system(GENERATE_SYSTEM_PROMPT),
                ChatMessage::user(format!("Claims:\n{material}\nQuestion: {query}")),
            ],
            &ChatOptions::default(),
        )?;
        Ok(response.content)
    }
}
