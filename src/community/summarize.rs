//! LLM summarisation of detected communities.

use crate::llm::{ChatMessage, ChatOptions, LlmClient, extract_json_from_response};
use crate::models::{Community, Entity};
use crate::storage::GraphStore;
use crate::models::EntityId;
use crate::Result;
use serde::Deserialize;
use std::sync::Arc;

const SUMMARY_SYSTEM_PROMPT: &str = r#"You summarise clusters of research-literature entities.

Return ONLY a JSON object: {"summary": "...", "keywords": ["...", "..."]}
The summary is one or two sentences, roughly 100-150 characters, describing
what unites the members. Keywords are 3-8 short phrases."#;

/// Options for community summarisation.
#[derive(Debug, Clone)]
pub struct SummarizerOptions {
    /// Cap on members listed in the prompt.
    pub max_members_in_prompt: usize,
}

impl Default for SummarizerOptions {
    fn default() -> Self {
        Self {
            max_members_in_prompt: 20,
        }
    }
}

#[derive(Deserialize)]
struct WireSummary {
    summary: String,
    #[serde(default)]
    keywords: Vec<String>,
}

/// Generates and persists natural-language summaries for communities.
pub struct CommunitySummarizer {
    llm: Arc<dyn LlmClient>,
    graph: Arc<dyn GraphStore>,
    options: SummarizerOptions,
}

impl CommunitySummarizer {
    /// Creates a summarizer.
    #[must_use]
    pub fn new(
        llm: Arc<dyn LlmClient>,
        graph: Arc<dyn GraphStore>,
        options: SummarizerOptions,
    ) -> Self {
        Self {
            llm,
            graph,
            options,
        }
    }

    /// Summarises a community in place.
    ///
    /// Idempotent: a community that already carries a summary is left
    /// untouched unless `force` is set. Returns whether a summary was
    /// (re)generated. On LLM failure a deterministic fallback summary is
    /// produced from member names.
    ///
    /// # Errors
    ///
    /// Returns an error if member lookups fail.
    pub fn summarize(&self, community: &mut Community, force: bool) -> Result<bool> {
        if community.summary.is_some() && !force {
            return Ok(false);
        }

        let members = self.member_roster(community)?;
        let user = format!(
            "Community at level {} with {} members:\n{}",
            community.level,
            community.member_count(),
            members
        );

        let generated = self
            .llm
            .chat(
                &[
                    ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
                    ChatMessage::user(user),
                ],
                &ChatOptions::deterministic(),
            )
            .ok()
            .and_then(|response| {
                serde_json::from_str::<WireSummary>(extract_json_from_response(&response.content))
                    .ok()
            });

        match generated {
            Some(wire) => community.set_summary(wire.summary, wire.keywords),
            None => {
                tracing::warn!(
                    community = community.id.as_str(),
                    "summarisation fell back to member roster"
                );
                let (summary, keywords) = Self::fallback_summary(community);
                community.set_summary(summary, keywords);
            },
        }
        Ok(true)
    }

    /// Summarises every community, skipping already-summarised ones unless
    /// `force` is set. Returns the number regenerated.
    ///
    /// # Errors
    ///
    /// Returns an error if member lookups fail.
    pub fn summarize_all(&self, communities: &mut [Community], force: bool) -> Result<usize> {
        let mut regenerated = 0;
        for community in communities.iter_mut() {
            if self.summarize(community, force)? {
                regenerated += 1;
            }
        }
        Ok(regenerated)
    }

    fn member_roster(&self, community: &Community) -> Result<String> {
        let mut lines = String::new();
        for member_id in community
            .member_ids
            .iter()
            .take(self.options.max_members_in_prompt)
        {
            let entity: Option<Entity> = self.graph.get_entity(&EntityId::new(member_id.clone()))?;
            match entity {
                Some(e) => {
                    let description = if e.description.is_empty() {
                        String::new()
                    } else {
                        format!(": {}", e.description.lines().next().unwrap_or_default())
                    };
                    lines.push_str(&format!(
                        "- {} ({}){}\n",
                        e.name,
                        e.entity_type.as_str(),
                        description
                    ));
                },
                None => lines.push_str(&format!("- {member_id}\n")),
            }
        }
        Ok(lines)
    }

    fn fallback_summary(community: &Community) -> (String, Vec<String>) {
        let sample: Vec<String> = community.member_ids.iter().take(5).cloned().collect();
        (
            format!(
                "Community of {} related entities including {}",
                community.member_count(),
                sample.join(", ")
            ),
            sample,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::CommunityId;

    #[test]
    fn test_fallback_summary_mentions_members() {
        let community = Community::new(
            CommunityId::for_level(0, 0),
            0,
            vec!["gpt4".to_string(), "openai".to_string()],
        );
        let (summary, keywords) = CommunitySummarizer::fallback_summary(&community);
        assert!(summary.contains("gpt4"));
        assert_eq!(keywords.len(), 2);
    }
}
