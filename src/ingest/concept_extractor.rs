//! Language-agnostic concept extraction.
//!
//! Approximates noun phrases as runs of non-stop-word tokens, counts their
//! frequency across chunks, and records within-chunk co-occurrences. No
//! model calls; this stage is deterministic and cheap.

use crate::models::{Concept, ConceptCooccurrence};
use crate::models::TextChunk;
use std::collections::{BTreeMap, BTreeSet};

/// Stop words removed during normalization.
///
/// English-biased but harmless for other languages: unknown words simply
/// pass through.
static STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "of", "in", "on", "at",
    "to", "for", "with", "by", "from", "as", "and", "or", "but", "not", "no", "this", "that",
    "these", "those", "it", "its", "we", "our", "they", "their", "he", "she", "his", "her", "you",
    "your", "i", "my", "can", "could", "will", "would", "shall", "should", "may", "might", "must",
    "do", "does", "did", "have", "has", "had", "which", "who", "whom", "what", "when", "where",
    "how", "why", "than", "then", "there", "here", "such", "some", "any", "all", "both", "each",
    "more", "most", "other", "into", "over", "under", "between", "also", "very", "using", "used",
    "based", "via",
];

/// Options for concept extraction.
#[derive(Debug, Clone)]
pub struct ConceptExtractorOptions {
    /// Drop concepts seen fewer times than this across all chunks.
    pub min_frequency: u32,
    /// Keep at most this many concepts, by descending frequency.
    pub max_concepts: usize,
    /// Whether to keep capitalized mid-sentence tokens (proper nouns).
    pub include_proper_nouns: bool,
}

impl Default for ConceptExtractorOptions {
    fn default() -> Self {
        Self {
            min_frequency: 2,
            max_concepts: 200,
            include_proper_nouns: true,
        }
    }
}

/// Result of concept extraction over a chunk set.
#[derive(Debug, Clone, Default)]
pub struct ConceptExtraction {
    /// Extracted concepts with normalized importance (max = 1).
    pub concepts: Vec<Concept>,
    /// Within-chunk co-occurrence edges with normalized strength.
    pub cooccurrences: Vec<ConceptCooccurrence>,
}

/// Normalizes free text into query tokens: lowercase, stop words removed.
///
/// Shares the stop-word table with phrase extraction so query-side and
/// index-side normalization agree.
#[must_use]
pub fn query_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .map(|t| t.trim_matches('-').to_lowercase())
        .filter(|t| {
            t.chars().count() >= 2
                && !STOP_WORDS.contains(&t.as_str())
                && !t.chars().all(|c| c.is_ascii_digit())
        })
        .collect()
}

/// Deterministic noun-phrase extractor.
#[derive(Debug, Clone, Default)]
pub struct ConceptExtractor {
    options: ConceptExtractorOptions,
}

impl ConceptExtractor {
    /// Creates an extractor with the given options.
    #[must_use]
    pub const fn new(options: ConceptExtractorOptions) -> Self {
        Self { options }
    }

    /// Extracts concepts and co-occurrences from a chunk set.
    #[must_use]
    pub fn extract(&self, chunks: &[TextChunk]) -> ConceptExtraction {
        let mut concepts: BTreeMap<String, Concept> = BTreeMap::new();
        let mut chunk_concepts: Vec<(String, BTreeSet<String>)> = Vec::new();

        for chunk in chunks {
            let phrases = self.phrases(&chunk.content);
            let mut present: BTreeSet<String> = BTreeSet::new();
            for phrase in phrases {
                concepts
                    .entry(phrase.clone())
                    .or_insert_with(|| Concept::new(phrase.clone()))
                    .record(&chunk.id);
                present.insert(phrase);
            }
            chunk_concepts.push((chunk.id.clone(), present));
        }

        // Frequency filter, then cap by descending frequency.
        let mut kept: Vec<Concept> = concepts
            .into_values()
            .filter(|c| c.frequency >= self.options.min_frequency)
            .collect();
        kept.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.text.cmp(&b.text)));
        kept.truncate(self.options.max_concepts);

        // Importance is normalized so the most frequent concept scores 1.
        #[allow(clippy::cast_precision_loss)]
        let max_frequency = kept.first().map_or(1.0, |c| c.frequency as f32);
        for concept in &mut kept {
            #[allow(clippy::cast_precision_loss)]
            let importance = concept.frequency as f32 / max_frequency;
            concept.importance = importance;
        }

        let kept_names: BTreeSet<&str> = kept.iter().map(|c| c.text.as_str()).collect();

        // Within-chunk co-occurrence counts.
        let mut pair_counts: BTreeMap<(String, String), u32> = BTreeMap::new();
        for (_, present) in &chunk_concepts {
            let surviving: Vec<&String> = present
                .iter()
                .filter(|p| kept_names.contains(p.as_str()))
                .collect();
            for (i, a) in surviving.iter().enumerate() {
                for b in &surviving[i + 1..] {
                    let key = ConceptCooccurrence::pair_key(a, b);
                    *pair_counts.entry(key).or_insert(0) += 1;
                }
            }
        }

        let max_count = pair_counts.values().copied().max().unwrap_or(1);
        let cooccurrences = pair_counts
            .into_iter()
            .map(|((a, b), count)| {
                #[allow(clippy::cast_precision_loss)]
                let strength = count as f32 / max_count as f32;
                ConceptCooccurrence {
                    a,
                    b,
                    count,
                    strength,
                }
            })
            .collect();

        ConceptExtraction {
            concepts: kept,
            cooccurrences,
        }
    }

    /// Splits text into normalized candidate phrases (unigrams and bigrams
    /// over runs of non-stop-word tokens).
    fn phrases(&self, text: &str) -> Vec<String> {
        let mut phrases = Vec::new();
        for sentence in text.split(['.', '!', '?', '\n', ';']) {
            let mut run: Vec<String> = Vec::new();
            let mut first_token = true;
            for raw in sentence.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '\'')) {
                let token = raw.trim_matches(['-', '\'']);
                if token.is_empty() {
                    continue;
                }
                let is_proper = !first_token && token.chars().next().is_some_and(char::is_uppercase);
                first_token = false;
                let lower = token.to_lowercase();
                let keep = lower.chars().count() >= 2
                    && !STOP_WORDS.contains(&lower.as_str())
                    && !lower.chars().all(|c| c.is_ascii_digit())
                    && (self.options.include_proper_nouns || !is_proper);
                if keep {
                    run.push(lower);
                } else {
                    Self::flush_run(&mut run, &mut phrases);
                }
            }
            Self::flush_run(&mut run, &mut phrases);
        }
        phrases
    }

    fn flush_run(run: &mut Vec<String>, phrases: &mut Vec<String>) {
        if run.is_empty() {
            return;
        }
        for token in run.iter() {
            phrases.push(token.clone());
        }
        for pair in run.windows(2) {
            phrases.push(format!("{} {}", pair[0], pair[1]));
        }
        run.clear();
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn chunks() -> Vec<TextChunk> {
        vec![
            TextChunk::new("c1", "Transformer models rely on attention mechanisms."),
            TextChunk::new("c2", "Attention mechanisms let transformer models scale."),
            TextChunk::new("c3", "Graph neural networks differ from transformer models."),
        ]
    }

    #[test]
    fn test_frequency_and_importance() {
        let extractor = ConceptExtractor::new(ConceptExtractorOptions {
            min_frequency: 2,
            max_concepts: 50,
            include_proper_nouns: true,
        });
        let extraction = extractor.extract(&chunks());
        let transformer = extraction
            .concepts
            .iter()
            .find(|c| c.text == "transformer")
            .expect("transformer should survive the frequency filter");
        assert_eq!(transformer.frequency, 3);
        assert!((transformer.importance - 1.0).abs() < f32::EPSILON);

        // Importance never exceeds 1 and the max is exactly 1.
        assert!(extraction.concepts.iter().all(|c| c.importance <= 1.0));
        assert!(
            extraction
                .concepts
                .iter()
                .any(|c| (c.importance - 1.0).abs() < f32::EPSILON)
        );
    }

    #[test]
    fn test_stop_words_removed_and_lowercased() {
        let extractor = ConceptExtractor::new(ConceptExtractorOptions {
            min_frequency: 1,
            max_concepts: 50,
            include_proper_nouns: true,
        });
        let extraction = extractor.extract(&[TextChunk::new("c1", "The Attention is all")]);
        assert!(extraction.concepts.iter().all(|c| c.text == c.text.to_lowercase()));
        assert!(!extraction.concepts.iter().any(|c| c.text == "the"));
        assert!(extraction.concepts.iter().any(|c| c.text == "attention"));
    }

    #[test]
    fn test_cooccurrence_strength_normalized() {
        let extractor = ConceptExtractor::new(ConceptExtractorOptions {
            min_frequency: 2,
            max_concepts: 50,
            include_proper_nouns: true,
        });
        let extraction = extractor.extract(&chunks());
        assert!(!extraction.cooccurrences.is_empty());
        let max = extraction
            .cooccurrences
            .iter()
            .map(|e| e.strength)
            .fold(0.0_f32, f32::max);
        assert!((max - 1.0).abs() < f32::EPSILON);
        for edge in &extraction.cooccurrences {
            assert!(edge.a < edge.b, "pairs must be ordered");
            assert!(edge.strength > 0.0 && edge.strength <= 1.0);
        }
    }

    #[test]
    fn test_max_concepts_cap() {
        let extractor = ConceptExtractor::new(ConceptExtractorOptions {
            min_frequency: 1,
            max_concepts: 3,
            include_proper_nouns: true,
        });
        let extraction = extractor.extract(&chunks());
        assert!(extraction.concepts.len() <= 3);
    }
}
