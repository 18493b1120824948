//! Tool schema definitions.
//!
//! JSON Schema blobs describing each tool's input, served to protocol
//! clients for input validation and discovery.

use serde::Serialize;
use serde_json::{Value, json};

/// A tool with its input schema.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool arguments.
    pub input_schema: Value,
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// `search_entities` definition.
#[must_use]
pub fn search_entities_tool() -> ToolDefinition {
    tool(
        "search_entities",
        "Search entities by name, optionally filtered by type",
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Name or name fragment"},
                "entity_type": {"type": "string", "description": "Optional type filter"},
                "limit": {"type": "integer", "minimum": 1, "maximum": 100}
            },
            "required": ["query"]
        }),
    )
}

/// `create_entity` definition.
#[must_use]
pub fn create_entity_tool() -> ToolDefinition {
    tool(
        "create_entity",
        "Create or merge an entity",
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "entity_type": {"type": "string"},
                "description": {"type": "string"},
                "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0}
            },
            "required": ["name", "entity_type"]
        }),
    )
}

/// `search_relations` definition.
#[must_use]
pub fn search_relations_tool() -> ToolDefinition {
    tool(
        "search_relations",
        "List relations touching an entity",
        json!({
            "type": "object",
            "properties": {
                "entity_id": {"type": "string", "pattern": "^[A-Za-z0-9_-]{1,128}$"}
            },
            "required": ["entity_id"]
        }),
    )
}

/// `create_relation` definition.
#[must_use]
pub fn create_relation_tool() -> ToolDefinition {
    tool(
        "create_relation",
        "Create or merge a typed relation between two entities",
        json!({
            "type": "object",
            "properties": {
                "source_id": {"type": "string", "pattern": "^[A-Za-z0-9_-]{1,128}$"},
                "target_id": {"type": "string", "pattern": "^[A-Za-z0-9_-]{1,128}$"},
                "relation_type": {"type": "string"},
                "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0}
            },
            "required": ["source_id", "target_id", "relation_type"]
        }),
    )
}

/// `local_search` definition.
#[must_use]
pub fn local_search_tool() -> ToolDefinition {
    tool(
        "local_search",
        "Entity-neighbourhood retrieval with a generated answer",
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "minLength": 1, "maxLength": 1000}
            },
            "required": ["query"]
        }),
    )
}

/// `global_search` definition.
#[must_use]
pub fn global_search_tool() -> ToolDefinition {
    tool(
        "global_search",
        "Community-summary retrieval with a generated answer",
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "minLength": 1, "maxLength": 1000}
            },
            "required": ["query"]
        }),
    )
}

/// `detect_communities` definition.
#[must_use]
pub fn detect_communities_tool() -> ToolDefinition {
    tool(
        "detect_communities",
        "Run community detection and replace the stored layer",
        json!({
            "type": "object",
            "properties": {
                "min_community_size": {"type": "integer", "minimum": 1},
                "max_levels": {"type": "integer", "minimum": 1, "maximum": 5}
            }
        }),
    )
}

/// `get_entity_graph` definition.
#[must_use]
pub fn get_entity_graph_tool() -> ToolDefinition {
    tool(
        "get_entity_graph",
        "Neighbourhood records around an entity",
        json!({
            "type": "object",
            "properties": {
                "entity_id": {"type": "string", "pattern": "^[A-Za-z0-9_-]{1,128}$"},
                "depth": {"type": "integer", "minimum": 1, "maximum": 4}
            },
            "required": ["entity_id"]
        }),
    )
}

/// `natural_language_query` definition.
#[must_use]
pub fn natural_language_query_tool() -> ToolDefinition {
    tool(
        "natural_language_query",
        "Answer a free-form question, routed to a retrieval strategy",
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "minLength": 1, "maxLength": 1000},
                "mode": {"type": "string", "enum": ["local", "global"],
                         "description": "Retrieval strategy; defaults to local when configured"}
            },
            "required": ["query"]
        }),
    )
}

/// `chain_of_thought` definition.
#[must_use]
pub fn chain_of_thought_tool() -> ToolDefinition {
    tool(
        "chain_of_thought",
        "Answer a question with explicit graph-grounded reasoning steps",
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "minLength": 1, "maxLength": 1000}
            },
            "required": ["query"]
        }),
    )
}

/// `validate_response` definition.
#[must_use]
pub fn validate_response_tool() -> ToolDefinition {
    tool(
        "validate_response",
        "Check an answer for entity names absent from its context",
        json!({
            "type": "object",
            "properties": {
                "answer": {"type": "string"},
                "entity_ids": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["answer"]
        }),
    )
}

/// `check_consistency` definition.
#[must_use]
pub fn check_consistency_tool() -> ToolDefinition {
    tool(
        "check_consistency",
        "Detect contradictions in a claim set",
        json!({
            "type": "object",
            "properties": {
                "claims": {"type": "array", "items": {"type": "string"}, "minItems": 1}
            },
            "required": ["claims"]
        }),
    )
}
