//! Access-control fabric.
//!
//! API-key authentication, RBAC, rate limiting, input validation, secret
//! handling, and audit logging. Every externally-invoked operation passes
//! through this module before it can reach a store or an LLM.

pub mod api_key;
pub mod audit;
pub mod rate_limit;
pub mod rbac;
pub mod secrets;
pub mod validation;

pub use api_key::{ApiKey, ApiKeyManager, ApiKeyStore, InMemoryApiKeyStore, is_valid_key_format};
pub use audit::{AuditEntry, AuditLogger, AuditOutcome};
pub use rate_limit::{InMemoryRateLimitStore, RateLimitStore, RateLimiter, RateLimiterConfig};
pub use rbac::{AccessControl, Permission, RbacMiddleware, Role};
pub use secrets::{EnvSecretProvider, InMemorySecretProvider, SecretProvider, mask};
pub use validation::{
    FieldSchema, FieldType, InjectionKind, Validator, detect_injection, is_safe_cypher_input,
    is_valid_entity_id, sanitize_string,
};
