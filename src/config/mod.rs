//! Deployment configuration.
//!
//! Every component takes an explicit options struct with its defaults
//! documented at the definition site; this module only carries the
//! deployment-level settings read from the environment.
//!
//! # Environment Variables
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `YAGOKORO_GRAPH_URI` | Graph store URI | `memory://` |
//! | `YAGOKORO_GRAPH_USER` / `YAGOKORO_GRAPH_PASSWORD` | Graph store credentials | unset |
//! | `YAGOKORO_VECTOR_URI` | Vector store URI | `memory://` |
//! | `YAGOKORO_LLM_URL` | Chat/embedding endpoint | `http://localhost:11434/v1` |
//! | `YAGOKORO_LLM_MODEL` | Chat model name | `llama3.1` |
//! | `YAGOKORO_EMBEDDING_DIMENSION` | Fixed embedding dimension | `1536` |
//! | `YAGOKORO_SECRET_PREFIX` | Env prefix for the secret provider | `YAGOKORO_` |
//! | `YAGOKORO_REQUIRED_SECRETS` | Comma-separated required secret keys | empty |
//! | `YAGOKORO_REQUEST_TIMEOUT_MS` | Default request deadline | `30000` |

use secrecy::SecretString;
use serde::Deserialize;

/// Graph store connection settings.
#[derive(Debug, Clone)]
pub struct GraphStoreConfig {
    /// Store URI; `memory://` selects the in-memory backend.
    pub uri: String,
    /// Username, if the backend needs one.
    pub username: Option<String>,
    /// Password; zeroized on drop, never logged.
    pub password: Option<SecretString>,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            uri: "memory://".to_string(),
            username: None,
            password: None,
        }
    }
}

/// Vector store connection settings.
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Store URI; `memory://` selects the in-memory backend.
    pub uri: String,
    /// Fixed embedding dimension for the deployment.
    pub dimension: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            uri: "memory://".to_string(),
            dimension: 1536,
        }
    }
}

/// LLM endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL.
    pub url: String,
    /// Chat model name.
    pub model: String,
    /// Embedding model name.
    pub embedding_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/v1".to_string(),
            model: "llama3.1".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

/// Secret-provider settings.
#[derive(Debug, Clone)]
pub struct SecretConfig {
    /// Environment prefix the provider strips from keys.
    pub prefix: String,
    /// Keys the deployment requires to be present.
    pub required: Vec<String>,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            prefix: "YAGOKORO_".to_string(),
            required: Vec::new(),
        }
    }
}

/// Top-level deployment configuration.
#[derive(Debug, Clone, Default)]
pub struct YagokoroConfig {
    /// Graph store settings.
    pub graph: GraphStoreConfig,
    /// Vector store settings.
    pub vector: VectorStoreConfig,
    /// LLM endpoint settings.
    pub llm: LlmConfig,
    /// Secret-provider settings.
    pub secrets: SecretConfig,
    /// Default request deadline in milliseconds.
    pub request_timeout_ms: u64,
}

impl YagokoroConfig {
    /// Loads configuration from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self {
            request_timeout_ms: 30_000,
            ..Self::default()
        };

        if let Ok(uri) = std::env::var("YAGOKORO_GRAPH_URI") {
            config.graph.uri = uri;
        }
        config.graph.username = std::env::var("YAGOKORO_GRAPH_USER").ok();
        config.graph.password = std::env::var("YAGOKORO_GRAPH_PASSWORD")
            .ok()
            .map(SecretString::from);

        if let Ok(uri) = std::env::var("YAGOKORO_VECTOR_URI") {
            config.vector.uri = uri;
        }
        if let Some(dimension) = std::env::var("YAGOKORO_EMBEDDING_DIMENSION")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.vector.dimension = dimension;
        }

        if let Ok(url) = std::env::var("YAGOKORO_LLM_URL") {
            config.llm.url = url;
        }
        if let Ok(model) = std::env::var("YAGOKORO_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(model) = std::env::var("YAGOKORO_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }

        if let Ok(prefix) = std::env::var("YAGOKORO_SECRET_PREFIX") {
            config.secrets.prefix = prefix;
        }
        if let Ok(required) = std::env::var("YAGOKORO_REQUIRED_SECRETS") {
            config.secrets.required = required
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect();
        }

        if let Some(timeout) = std::env::var("YAGOKORO_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.request_timeout_ms = timeout;
        }

        config
    }
}
