//! LLM client abstraction.
//!
//! Provides a unified interface over chat-completion and embedding endpoints
//! so engines can be tested against scripted clients and deployments can
//! swap providers.
//!
//! # Interface
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`LlmClient::chat`] | Chat completion over a message list |
//! | [`LlmClient::embed`] | Single-text embedding |
//! | [`LlmClient::embed_many`] | Batch embedding |
//! | [`LlmClient::model_name`] | Provider/model identifier |
//!
//! # Errors
//!
//! Rate limiting surfaces as [`crate::Error::RateLimited`] with the
//! server-indicated delay, timeouts as [`crate::Error::Timeout`], transport
//! failures as [`crate::Error::Transient`], and invalid requests as
//! [`crate::Error::Validation`].

mod http;

pub use http::{HttpLlmClient, LlmHttpConfig, build_http_client};

use crate::Result;
use serde::{Deserialize, Serialize};

/// Role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instruction.
    System,
    /// End-user content.
    User,
    /// Prior model output.
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role.
    pub role: ChatRole,
    /// Message content.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call chat options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Completion token cap.
    pub max_tokens: Option<u32>,
    /// Model override for this call.
    pub model: Option<String>,
}

impl ChatOptions {
    /// Options tuned for deterministic structured extraction.
    #[must_use]
    pub fn deterministic() -> Self {
        Self {
            temperature: Some(0.0),
            max_tokens: None,
            model: None,
        }
    }
}

/// Token accounting for a chat call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens in the completion.
    pub completion_tokens: u32,
    /// Total tokens billed.
    pub total_tokens: u32,
}

/// Result of a chat call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Completion text.
    pub content: String,
    /// Why generation stopped (`stop`, `length`, ...).
    pub finish_reason: String,
    /// Token accounting.
    pub usage: TokenUsage,
    /// Model that served the call.
    pub model: String,
}

/// Trait for LLM providers.
pub trait LlmClient: Send + Sync {
    /// The configured model identifier.
    fn model_name(&self) -> &str;

    /// Generates a chat completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatResponse>;

    /// Embeds a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds a batch of texts.
    ///
    /// Default implementation embeds one at a time; providers with a batch
    /// endpoint should override it.
    ///
    /// # Errors
    ///
    /// Returns an error if any embedding fails.
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Extracts JSON from an LLM response, handling markdown code fences.
///
/// 1. ```` ```json ... ``` ```` blocks
/// 2. ```` ``` ... ``` ```` blocks without a language marker
/// 3. Raw JSON objects (first `{` to last `}`)
/// 4. JSON arrays (first `[` to last `]`)
///
/// Returns the trimmed input when no JSON is found.
#[must_use]
pub fn extract_json_from_response(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some((json_start, end)) = trimmed.find("```json").and_then(|start| {
        let json_start = start + 7;
        trimmed[json_start..]
            .find("```")
            .map(|end| (json_start, end))
    }) {
        return trimmed[json_start..json_start + end].trim();
    }

    if let Some((json_start, end)) = trimmed.find("```").and_then(|start| {
        let content_start = start + 3;
        let after_marker = &trimmed[content_start..];
        let json_start = after_marker
            .find(['{', '['])
            .map_or(content_start, |pos| content_start + pos);
        trimmed[json_start..]
            .find("```")
            .map(|end| (json_start, end))
    }) {
        return trimmed[json_start..json_start + end].trim();
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }

    trimmed
}
