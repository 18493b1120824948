//! Shared test doubles: a routing mock LLM and a deterministic embedder.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use yagokoro::llm::{ChatMessage, ChatOptions, ChatResponse, LlmClient, TokenUsage};
use yagokoro::{Error, Result};

/// Embedding dimension used across integration tests.
pub const TEST_DIMENSIONS: usize = 64;

/// Deterministic bag-of-tokens embedding; similar texts share tokens and
/// therefore direction.
#[must_use]
pub fn hash_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; TEST_DIMENSIONS];
    for token in text
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|t| !t.is_empty())
    {
        let mut hash: u64 = 1_469_598_103_934_665_603;
        for byte in token.to_lowercase().bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(1_099_511_628_211);
        }
        let index = usize::try_from(hash % TEST_DIMENSIONS as u64).unwrap();
        vector[index] += 1.0;
    }
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

type Responder = dyn Fn(&str, &str) -> Result<String> + Send + Sync;

/// Mock LLM routing on the system prompt; embeddings are hash-based.
pub struct MockLlm {
    responder: Box<Responder>,
    chat_calls: AtomicU32,
}

impl MockLlm {
    /// Creates a mock with a `(system, user) -> content` responder.
    pub fn new(responder: impl Fn(&str, &str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            chat_calls: AtomicU32::new(0),
        }
    }

    /// A mock that answers every chat with the same content.
    pub fn constant(content: &str) -> Arc<Self> {
        let content = content.to_string();
        Arc::new(Self::new(move |_, _| Ok(content.clone())))
    }

    /// A mock whose every chat call fails with a transient error.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self::new(|_, _| {
            Err(Error::Transient {
                operation: "chat".to_string(),
                cause: "mock outage".to_string(),
            })
        }))
    }

    /// Number of chat calls made so far.
    pub fn chat_calls(&self) -> u32 {
        self.chat_calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for MockLlm {
    fn model_name(&self) -> &str {
        "mock-llm"
    }

    fn chat(&self, messages: &[ChatMessage], _options: &ChatOptions) -> Result<ChatResponse> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        let system = messages
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let user = messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let content = (self.responder)(system, user)?;
        Ok(ChatResponse {
            content,
            finish_reason: "stop".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 10,
                total_tokens: 20,
            },
            model: "mock-llm".to_string(),
        })
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embedding(text))
    }
}

/// An LLM whose embeddings fail (chat succeeds), for fail-open tests.
pub struct BrokenEmbedder;

impl LlmClient for BrokenEmbedder {
    fn model_name(&self) -> &str {
        "broken-embedder"
    }

    fn chat(&self, _messages: &[ChatMessage], _options: &ChatOptions) -> Result<ChatResponse> {
        Ok(ChatResponse {
            content: "ok".to_string(),
            finish_reason: "stop".to_string(),
            usage: TokenUsage::default(),
            model: "broken-embedder".to_string(),
        })
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::Transient {
            operation: "embed".to_string(),
            cause: "mock outage".to_string(),
        })
    }
}

/// Routes ingestion prompts: entity extraction and relation extraction for
/// the canonical "GPT-4 developed by OpenAI" chunk.
pub fn gpt4_ingestion_llm() -> Arc<MockLlm> {
    Arc::new(MockLlm::new(|system, _user| {
        if system.contains("extract typed entities") {
            Ok(r#"{"entities": [
                {"temp_id": "e1", "name": "GPT-4", "type": "ai_model",
                 "description": "A large language model", "confidence": 0.95},
                {"temp_id": "e2", "name": "OpenAI", "type": "organization",
                 "description": "AI research company", "confidence": 0.95}
            ]}"#
                .to_string())
        } else if system.contains("extract typed relations") {
            Ok(r#"{"relations": [
                {"source": "e1", "target": "e2", "type": "DEVELOPED_BY", "confidence": 0.95}
            ]}"#
                .to_string())
        } else {
            Ok("{}".to_string())
        }
    }))
}
