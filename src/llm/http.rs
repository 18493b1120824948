//! HTTP LLM client for OpenAI-compatible chat and embedding endpoints.

use super::{ChatMessage, ChatOptions, ChatResponse, LlmClient, TokenUsage};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP client configuration for LLM requests.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(timeout_ms) = std::env::var("YAGOKORO_LLM_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = std::env::var("YAGOKORO_LLM_CONNECT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.connect_timeout_ms = connect_timeout_ms;
        }
        config
    }
}

/// Builds a blocking HTTP client with the configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }
    builder.build().unwrap_or_else(|err| {
        tracing::warn!("failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: WireResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// LLM client speaking the OpenAI-compatible HTTP protocol.
///
/// The API key is held in a [`SecretString`] and zeroized on drop; it is
/// never logged or echoed into error messages.
pub struct HttpLlmClient {
    endpoint: String,
    model: String,
    embedding_model: String,
    api_key: Option<SecretString>,
    client: reqwest::blocking::Client,
}

impl HttpLlmClient {
    /// Creates a client for the given endpoint and model.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
            client: build_http_client(LlmHttpConfig::from_env()),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Sets the embedding model.
    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Sets HTTP timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: LlmHttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    fn request(&self, path: &str, body: &impl Serialize) -> Result<reqwest::blocking::Response> {
        let mut request = self
            .client
            .post(format!("{}{path}", self.endpoint))
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        let response = request.send().map_err(|e| map_transport_error(path, &e))?;
        map_status(path, response)
    }
}

fn map_transport_error(operation: &str, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            operation: operation.to_string(),
        }
    } else {
        Error::Transient {
            operation: operation.to_string(),
            cause: err.to_string(),
        }
    }
}

fn map_status(
    operation: &str,
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 429 {
        let retry_after_seconds = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(Error::RateLimited {
            retry_after_seconds,
        });
    }
    if status.is_server_error() {
        return Err(Error::Transient {
            operation: operation.to_string(),
            cause: format!("server returned {status}"),
        });
    }
    // Remaining 4xx responses are invalid requests; never retried.
    Err(Error::Validation {
        field: "request".to_string(),
        message: format!("{operation} rejected with {status}"),
    })
}

impl LlmClient for HttpLlmClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ChatResponse> {
        let wire_messages = messages
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    super::ChatRole::System => "system",
                    super::ChatRole::User => "user",
                    super::ChatRole::Assistant => "assistant",
                },
                content: &m.content,
            })
            .collect();
        let body = ChatRequest {
            model: options.model.as_deref().unwrap_or(&self.model),
            messages: wire_messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let response = self.request("/chat/completions", &body)?;
        let parsed: ChatCompletionResponse =
            response.json().map_err(|e| Error::Transient {
                operation: "chat".to_string(),
                cause: format!("malformed completion response: {e}"),
            })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            Error::Transient {
                operation: "chat".to_string(),
                cause: "completion response had no choices".to_string(),
            }
        })?;
        let usage = parsed.usage.unwrap_or_default();

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            },
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_many(std::slice::from_ref(&text.to_string()))?;
        vectors.pop().ok_or_else(|| Error::Transient {
            operation: "embed".to_string(),
            cause: "embedding response was empty".to_string(),
        })
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts.iter().map(String::as_str).collect(),
        };
        let response = self.request("/embeddings", &body)?;
        let parsed: EmbeddingResponse = response.json().map_err(|e| Error::Transient {
            operation: "embed".to_string(),
            cause: format!("malformed embedding response: {e}"),
        })?;

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_is_trimmed() {
        let client = HttpLlmClient::new("http://localhost:8080/v1/", "test-model");
        assert_eq!(client.endpoint, "http://localhost:8080/v1");
        assert_eq!(client.model_name(), "test-model");
    }

    #[test]
    fn test_http_config_defaults() {
        let config = LlmHttpConfig::default();
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.connect_timeout_ms, 3_000);
    }
}
