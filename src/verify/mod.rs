//! Answer and claim consistency checks.
//!
//! Two concerns: contradictions between extracted claims (temporal,
//! numeric, negation) and hallucinated entity names in generated answers
//! (names absent from the retrieval context).

use crate::models::QueryContext;
use crate::models::normalize_name;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static YEAR_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(1[89]\d{2}|20\d{2})\b").ok());

static NUMBER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").ok());

static NEGATION_TOKENS: &[&str] = &["not", "no", "never", "cannot", "n't", "without"];

/// Kind of contradiction between two claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionKind {
    /// Same statement, different years.
    Temporal,
    /// Same statement, different quantities.
    Numeric,
    /// One claim negates the other.
    Negation,
}

/// A detected contradiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contradiction {
    /// First claim (index into the checked list).
    pub claim_a: usize,
    /// Second claim.
    pub claim_b: usize,
    /// Kind of conflict.
    pub kind: ContradictionKind,
    /// Human-readable detail.
    pub detail: String,
}

/// Result of a coherence check over claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoherenceReport {
    /// Whether no contradictions were found.
    pub is_coherent: bool,
    /// 1.0 minus the contradiction density, in [0, 1].
    pub coherence_score: f32,
    /// Every detected contradiction.
    pub contradictions: Vec<Contradiction>,
}

/// Checks claims and answers for internal consistency.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyChecker {
    /// Token-overlap ratio above which two claims describe the same fact.
    pub topic_overlap_threshold: f32,
}

impl ConsistencyChecker {
    /// Creates a checker with the default topic-overlap threshold (0.5).
    #[must_use]
    pub fn new() -> Self {
        Self {
            topic_overlap_threshold: 0.5,
        }
    }

    /// Checks a claim set for contradictions.
    #[must_use]
    pub fn check_claims(&self, claims: &[String]) -> CoherenceReport {
        let mut contradictions = Vec::new();
        for i in 0..claims.len() {
            for j in (i + 1)..claims.len() {
                if let Some(kind) = self.compare(&claims[i], &claims[j]) {
                    contradictions.push(Contradiction {
                        claim_a: i,
                        claim_b: j,
                        kind,
                        detail: format!("'{}' conflicts with '{}'", claims[i], claims[j]),
                    });
                }
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let coherence_score = if claims.is_empty() {
            1.0
        } else {
            (1.0 - contradictions.len() as f32 / claims.len() as f32).clamp(0.0, 1.0)
        };

        CoherenceReport {
            is_coherent: contradictions.is_empty(),
            coherence_score,
            contradictions,
        }
    }

    /// Entity names mentioned in an answer but absent from its context.
    ///
    /// Candidate mentions are capitalized token runs that are not sentence
    /// openers; a mention is hallucinated when it matches no context entity
    /// name under normalization.
    #[must_use]
    pub fn hallucinated_entities(answer: &str, context: &QueryContext) -> Vec<String> {
        let known: BTreeSet<String> = context
            .entities
            .iter()
            .map(|e| normalize_name(&e.name))
            .collect();

        let mut hallucinated = BTreeSet::new();
        for candidate in candidate_mentions(answer) {
            let normalized = normalize_name(&candidate);
            let matches_known = known
                .iter()
                .any(|name| *name == normalized || name.contains(&normalized));
            if !matches_known {
                hallucinated.insert(candidate);
            }
        }
        hallucinated.into_iter().collect()
    }

    /// Whether an answer only names entities present in its context.
    #[must_use]
    pub fn answer_is_grounded(answer: &str, context: &QueryContext) -> bool {
        Self::hallucinated_entities(answer, context).is_empty()
    }

    fn compare(&self, a: &str, b: &str) -> Option<ContradictionKind> {
        if self.topic_overlap(a, b) < self.topic_overlap_threshold {
            return None;
        }

        let years_a = extract_years(a);
        let years_b = extract_years(b);
        if !years_a.is_empty() && !years_b.is_empty() && years_a.is_disjoint(&years_b) {
            return Some(ContradictionKind::Temporal);
        }

        let negated_a = has_negation(a);
        let negated_b = has_negation(b);
        if negated_a != negated_b {
            return Some(ContradictionKind::Negation);
        }

        let numbers_a = extract_numbers(a);
        let numbers_b = extract_numbers(b);
        if !numbers_a.is_empty() && !numbers_b.is_empty() && numbers_a != numbers_b {
            return Some(ContradictionKind::Numeric);
        }

        None
    }

    /// Jaccard overlap of the claims' tokens, numbers excluded.
    fn topic_overlap(&self, a: &str, b: &str) -> f32 {
        let tokens_a = topic_tokens(a);
        let tokens_b = topic_tokens(b);
        if tokens_a.is_empty() || tokens_b.is_empty() {
            return 0.0;
        }
        let intersection = tokens_a.intersection(&tokens_b).count();
        let union = tokens_a.union(&tokens_b).count();
        #[allow(clippy::cast_precision_loss)]
        let overlap = intersection as f32 / union as f32;
        overlap
    }
}

fn topic_tokens(claim: &str) -> BTreeSet<String> {
    claim
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .map(str::to_lowercase)
        .filter(|t| !t.is_empty() && t.parse::<f64>().is_err())
        .filter(|t| !NEGATION_TOKENS.contains(&t.as_str()))
        .collect()
}

fn extract_years(claim: &str) -> BTreeSet<i32> {
    YEAR_PATTERN.as_ref().map_or_else(BTreeSet::new, |re| {
        re.find_iter(claim)
            .filter_map(|m| m.as_str().parse().ok())
            .collect()
    })
}

fn extract_numbers(claim: &str) -> BTreeSet<String> {
    let years = extract_years(claim);
    NUMBER_PATTERN.as_ref().map_or_else(BTreeSet::new, |re| {
        re.find_iter(claim)
            .map(|m| m.as_str().to_string())
            .filter(|n| n.parse::<i32>().map_or(true, |v| !years.contains(&v)))
            .collect()
    })
}

fn has_negation(claim: &str) -> bool {
    let lower = claim.to_lowercase();
    NEGATION_TOKENS
        .iter()
        .any(|t| lower.split_whitespace().any(|w| w == *t) || lower.contains("n't"))
}

/// Capitalized token runs that are plausibly entity mentions.
fn candidate_mentions(answer: &str) -> Vec<String> {
    let mut mentions = Vec::new();
    for sentence in answer.split(['.', '!', '?', '\n']) {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        let mut run: Vec<&str> = Vec::new();
        for (i, word) in words.iter().enumerate() {
            let cleaned = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '-');
            let capitalized = cleaned.chars().next().is_some_and(char::is_uppercase);
            // Sentence openers are not evidence of an entity mention.
            if capitalized && i > 0 {
                run.push(cleaned);
            } else {
                if !run.is_empty() {
                    mentions.push(run.join(" "));
                    run.clear();
                }
            }
        }
        if !run.is_empty() {
            mentions.push(run.join(" "));
        }
    }
    mentions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, EntityId, EntityType};

    #[test]
    fn test_temporal_contradiction() {
        let checker = ConsistencyChecker::new();
        let report = checker.check_claims(&[
            "GPT-4 released in 2023".to_string(),
            "GPT-4 released in 2022".to_string(),
        ]);
        assert!(!report.is_coherent);
        assert!(report.coherence_score < 0.7);
        assert_eq!(report.contradictions.len(), 1);
        assert_eq!(report.contradictions[0].kind, ContradictionKind::Temporal);
    }

    #[test]
    fn test_negation_contradiction() {
        let checker = ConsistencyChecker::new();
        let report = checker.check_claims(&[
            "Transformers use attention mechanisms".to_string(),
            "Transformers do not use attention mechanisms".to_string(),
        ]);
        assert!(!report.is_coherent);
        assert_eq!(report.contradictions[0].kind, ContradictionKind::Negation);
    }

    #[test]
    fn test_numeric_contradiction() {
        let checker = ConsistencyChecker::new();
        let report = checker.check_claims(&[
            "The model has 175 billion parameters".to_string(),
            "The model has 70 billion parameters".to_string(),
        ]);
        assert!(!report.is_coherent);
        assert_eq!(report.contradictions[0].kind, ContradictionKind::Numeric);
    }

    #[test]
    fn test_unrelated_claims_are_coherent() {
        let checker = ConsistencyChecker::new();
        let report = checker.check_claims(&[
            "GPT-4 released in 2023".to_string(),
            "AlphaFold predicts protein structures".to_string(),
        ]);
        assert!(report.is_coherent);
        assert!((report.coherence_score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_empty_claims_are_coherent() {
        let checker = ConsistencyChecker::new();
        let report = checker.check_claims(&[]);
        assert!(report.is_coherent);
    }

    fn context_with(names: &[&str]) -> QueryContext {
        QueryContext {
            entities: names
                .iter()
                .map(|name| {
                    Entity::new(EntityType::AiModel, *name)
                        .with_id(EntityId::new(name.to_lowercase()))
                })
                .collect(),
            ..QueryContext::default()
        }
    }

    #[test]
    fn test_grounded_answer_passes() {
        let context = context_with(&["GPT-4", "OpenAI"]);
        let answer = "The model GPT-4 was created at OpenAI.";
        assert!(ConsistencyChecker::answer_is_grounded(answer, &context));
    }

    #[test]
    fn test_hallucinated_name_detected() {
        let context = context_with(&["GPT-4"]);
        let answer = "It was built by researchers at DeepMind.";
        let hallucinated = ConsistencyChecker::hallucinated_entities(answer, &context);
        assert!(hallucinated.iter().any(|h| h.contains("DeepMind")));
    }
}
