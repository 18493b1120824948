//! # Yagokoro
//!
//! A knowledge-graph retrieval engine (GraphRAG) for research literature.
//!
//! Yagokoro ingests text chunks from papers, extracts typed entities and
//! relations into a labelled property graph with vector embeddings, discovers
//! hierarchical communities over that graph, and answers natural-language
//! queries through local, global, and hybrid retrieval strategies.
//!
//! ## Features
//!
//! - Idempotent ingestion: entity/relation extraction with merge semantics
//! - Hierarchical community detection with LLM-generated summaries
//! - Local (entity-neighbourhood), global (community), and hybrid search
//! - Multi-hop path reasoning with caching and natural-language explanation
//! - Budgeted "lazy" retrieval over a concept graph
//! - Access-control fabric: API keys, RBAC, rate limiting, input validation
//!
//! ## Example
//!
//! ```rust,ignore
//! use yagokoro::ingest::{IngestionPipeline, PipelineOptions};
//! use yagokoro::models::TextChunk;
//!
//! let pipeline = IngestionPipeline::new(entities, relations, merger, PipelineOptions::default());
//! let status = pipeline.ingest_document("doc-1", &chunks);
//! println!("merged {} entities", status.entities_merged);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod analytics;
pub mod backup;
pub mod community;
pub mod config;
pub mod ingest;
pub mod lazy;
pub mod llm;
pub mod models;
pub mod observability;
pub mod paths;
pub mod query;
pub mod security;
pub mod server;
pub mod storage;
pub mod verify;

// Re-exports for convenience
pub use config::YagokoroConfig;
pub use llm::LlmClient;
pub use models::{
    Citation, Community, Concept, Entity, EntityId, EntityType, QueryResponse, QueryType, Relation,
    RelationType, SearchMode, TextChunk,
};
pub use storage::{GraphStore, VectorStore};

/// Error type for yagokoro operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
/// Every variant maps to one of the external error-code classes:
///
/// | Class | Meaning | Variants |
/// |-------|---------|----------|
/// | `1xxx` | validation | [`Error::Validation`], [`Error::NotFound`] |
/// | `2xxx` | connectivity | [`Error::Transient`], [`Error::Timeout`] |
/// | `3xxx` | authz | [`Error::PermissionDenied`], [`Error::InjectionDetected`] |
/// | `4xxx` | quota | [`Error::RateLimited`] |
/// | `5xxx` | internal | [`Error::Conflict`], [`Error::Fatal`] |
#[derive(Debug, ThisError)]
pub enum Error {
    /// A transient I/O failure (connection refused, reset, DNS).
    ///
    /// Retryable with backoff, at most three attempts.
    #[error("transient failure in '{operation}': {cause}")]
    Transient {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The remote service asked us to slow down.
    #[error("rate limited{}", retry_after_seconds.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited {
        /// Server-indicated delay before the next attempt, when known.
        retry_after_seconds: Option<u64>,
    },

    /// An operation exceeded its deadline.
    ///
    /// Retry once unless the request deadline itself is exceeded.
    #[error("operation '{operation}' timed out")]
    Timeout {
        /// The operation that timed out.
        operation: String,
    },

    /// Invalid input was provided. Never retried.
    #[error("validation failed for '{field}': {message}")]
    Validation {
        /// The offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// A referenced resource does not exist.
    #[error("not found: {resource}")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },

    /// Authentication or authorization failed.
    ///
    /// The failing API key is never included in the message or logs.
    #[error("permission denied: {reason}")]
    PermissionDenied {
        /// Why the request was rejected (key state or missing permission).
        reason: String,
    },

    /// An injection pattern was detected in user input. Blocked and audited.
    #[error("injection detected in '{field}'")]
    InjectionDetected {
        /// The field carrying the hostile input.
        field: String,
    },

    /// An invariant violation was detected (e.g. conflicting merge state).
    #[error("conflicting state: {diagnostic}")]
    Conflict {
        /// Diagnostic describing the violated invariant.
        diagnostic: String,
    },

    /// Unrecoverable failure. The process stays up; the request fails.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl Error {
    /// Returns the four-digit error code for external callers.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 1000,
            Self::NotFound { .. } => 1404,
            Self::Transient { .. } => 2000,
            Self::Timeout { .. } => 2408,
            Self::PermissionDenied { .. } => 3000,
            Self::InjectionDetected { .. } => 3100,
            Self::RateLimited { .. } => 4290,
            Self::Conflict { .. } => 5409,
            Self::Fatal(_) => 5000,
        }
    }

    /// Whether the caller may retry the failed operation.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::RateLimited { .. } | Self::Timeout { .. }
        )
    }

    /// Server-indicated retry delay, if any.
    #[must_use]
    pub const fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::RateLimited {
                retry_after_seconds,
            } => *retry_after_seconds,
            _ => None,
        }
    }
}

/// Result type alias for yagokoro operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized so every subsystem agrees on the clock. Falls back to 0 if
/// the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
