//! Natural-language path explanation.
//!
//! Builds a template-based description from per-relation phrase maps
//! (locale-aware) and optionally polishes it with an LLM. On LLM failure
//! the template result stands.

use crate::llm::{ChatMessage, ChatOptions, LlmClient};
use crate::models::{GraphPath, RelationType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Supported explanation locales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// English.
    #[default]
    En,
    /// Japanese.
    Ja,
}

/// The connective phrase for a relation type in a locale.
#[must_use]
pub const fn relation_phrase(relation_type: RelationType, locale: Locale) -> &'static str {
    match locale {
        Locale::En => match relation_type {
            RelationType::DevelopedBy => "was developed by",
            RelationType::UsesTechnique => "uses the technique",
            RelationType::BasedOn => "is based on",
            RelationType::EmployedAt => "is employed at",
            RelationType::EvaluatedOn => "was evaluated on",
            RelationType::Authored => "authored",
            RelationType::MemberOf => "is a member of",
            RelationType::Improves => "improves on",
            RelationType::DerivedFrom => "is derived from",
            RelationType::BelongsTo => "belongs to",
            RelationType::Cites => "cites",
        },
        Locale::Ja => match relation_type {
            RelationType::DevelopedBy => "によって開発された",
            RelationType::UsesTechnique => "という技術を使用する",
            RelationType::BasedOn => "に基づいている",
            RelationType::EmployedAt => "に所属している",
            RelationType::EvaluatedOn => "で評価された",
            RelationType::Authored => "を執筆した",
            RelationType::MemberOf => "のメンバーである",
            RelationType::Improves => "を改善する",
            RelationType::DerivedFrom => "から派生した",
            RelationType::BelongsTo => "に属する",
            RelationType::Cites => "を引用している",
        },
    }
}

/// One relation of a path, rendered with endpoint names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRelation {
    /// Source entity name.
    pub source_name: String,
    /// Relation type.
    pub relation_type: RelationType,
    /// Target entity name.
    pub target_name: String,
    /// Localized description of this step.
    pub description: String,
}

/// A rendered path explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathExplanation {
    /// Template-based description; always present.
    pub description: String,
    /// LLM-polished variant, when an LLM was available and succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polished: Option<String>,
    /// Per-step relation descriptions.
    pub key_relations: Vec<KeyRelation>,
}

/// Options for the explainer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplainerOptions {
    /// Output locale.
    pub locale: Locale,
}

/// Renders paths into natural language.
pub struct PathExplainer {
    llm: Option<Arc<dyn LlmClient>>,
    options: ExplainerOptions,
}

impl PathExplainer {
    /// Creates a template-only explainer.
    #[must_use]
    pub const fn new(options: ExplainerOptions) -> Self {
        Self { llm: None, options }
    }

    /// Adds an LLM for polishing.
    #[must_use]
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Explains a path.
    #[must_use]
    pub fn explain(&self, path: &GraphPath) -> PathExplanation {
        let key_relations = self.key_relations(path);
        let description = Self::join_steps(&key_relations, self.options.locale, path);
        let polished = self.polish(&description);
        PathExplanation {
            description,
            polished,
            key_relations,
        }
    }

    fn key_relations(&self, path: &GraphPath) -> Vec<KeyRelation> {
        let mut steps = Vec::new();
        for (i, relation) in path.relations.iter().enumerate() {
            let (Some(a), Some(b)) = (path.entities.get(i), path.entities.get(i + 1)) else {
                continue;
            };
            // The traversal is undirected; render along the stored edge
            // direction so the phrase reads correctly.
            let (source_name, target_name) = if relation.source_id == a.id {
                (a.name.clone(), b.name.clone())
            } else {
                (b.name.clone(), a.name.clone())
            };
            let phrase = relation_phrase(relation.relation_type, self.options.locale);
            let description = match self.options.locale {
                Locale::En => format!("{source_name} {phrase} {target_name}"),
                Locale::Ja => format!("{source_name}は{target_name}{phrase}"),
            };
            steps.push(KeyRelation {
                source_name,
                relation_type: relation.relation_type,
                target_name,
                description,
            });
        }
        steps
    }

    fn join_steps(steps: &[KeyRelation], locale: Locale, path: &GraphPath) -> String {
        if steps.is_empty() {
            return path.entities.first().map_or_else(String::new, |e| match locale {
                Locale::En => format!("{} stands alone in this query.", e.name),
                Locale::Ja => format!("{}はこのクエリ内で単独の存在です。", e.name),
            });
        }
        let joined = steps
            .iter()
            .map(|s| s.description.clone())
            .collect::<Vec<_>>();
        match locale {
            Locale::En => format!("{}.", joined.join("; ")),
            Locale::Ja => format!("{}。", joined.join("。")),
        }
    }

    fn polish(&self, description: &str) -> Option<String> {
        let llm = self.llm.as_ref()?;
        let instruction = match self.options.locale {
            Locale::En => "Rewrite this graph-path description as one fluent English sentence. \
                           Keep every entity name unchanged.",
            Locale::Ja => "次のグラフ経路の説明を自然な日本語の一文に書き直してください。\
                           エンティティ名は変更しないでください。",
        };
        match llm.chat(
            &[
                ChatMessage::system(instruction),
                ChatMessage::user(description.to_string()),
            ],
            &ChatOptions::default(),
        ) {
            Ok(response) if !response.content.trim().is_empty() => {
                Some(response.content.trim().to_string())
            },
            Ok(_) => None,
            Err(e) => {
                // Template output stands on LLM failure.
                tracing::debug!(error = %e, "path polish failed; using template");
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, EntityId, EntityType, Relation};

    fn path() -> GraphPath {
        GraphPath::new(
            vec![
                Entity::new(EntityType::AiModel, "GPT-4").with_id(EntityId::new("gpt4")),
                Entity::new(EntityType::Organization, "OpenAI").with_id(EntityId::new("openai")),
            ],
            vec![Relation::new(
                EntityId::new("gpt4"),
                EntityId::new("openai"),
                RelationType::DevelopedBy,
            )],
        )
    }

    #[test]
    fn test_english_template() {
        let explainer = PathExplainer::new(ExplainerOptions { locale: Locale::En });
        let explanation = explainer.explain(&path());
        assert_eq!(explanation.description, "GPT-4 was developed by OpenAI.");
        assert!(explanation.polished.is_none());
        assert_eq!(explanation.key_relations.len(), 1);
        assert_eq!(explanation.key_relations[0].source_name, "GPT-4");
        assert_eq!(explanation.key_relations[0].target_name, "OpenAI");
    }

    #[test]
    fn test_japanese_template() {
        let explainer = PathExplainer::new(ExplainerOptions { locale: Locale::Ja });
        let explanation = explainer.explain(&path());
        assert!(explanation.description.contains("GPT-4"));
        assert!(explanation.description.contains("によって開発された"));
    }

    #[test]
    fn test_reversed_edge_renders_along_direction() {
        // Path traversed from OpenAI to GPT-4; the stored edge still points
        // gpt4 -> openai, so the phrase must keep GPT-4 as source.
        let reversed = GraphPath::new(
            vec![
                Entity::new(EntityType::Organization, "OpenAI").with_id(EntityId::new("openai")),
                Entity::new(EntityType::AiModel, "GPT-4").with_id(EntityId::new("gpt4")),
            ],
            vec![Relation::new(
                EntityId::new("gpt4"),
                EntityId::new("openai"),
                RelationType::DevelopedBy,
            )],
        );
        let explainer = PathExplainer::new(ExplainerOptions { locale: Locale::En });
        let explanation = explainer.explain(&reversed);
        assert_eq!(explanation.key_relations[0].source_name, "GPT-4");
    }

    #[test]
    fn test_single_entity_path() {
        let explainer = PathExplainer::new(ExplainerOptions { locale: Locale::En });
        let single = GraphPath::single(
            Entity::new(EntityType::AiModel, "GPT-4").with_id(EntityId::new("gpt4")),
        );
        let explanation = explainer.explain(&single);
        assert!(explanation.description.contains("GPT-4"));
        assert!(explanation.key_relations.is_empty());
    }
}
