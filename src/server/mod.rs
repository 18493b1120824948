//! Inter-process tool surface.
//!
//! A transport-agnostic registry of tools dispatched over JSON values,
//! plus read-only resources addressed by `yagokoro://<namespace>/<leaf>`
//! URIs. Every dispatch passes the access-control fabric in a fixed order:
//! authenticate → rate-limit → authorize → validate → handler.

pub mod definitions;

pub use definitions::ToolDefinition;

use crate::community::{CommunityDetector, CommunityPersister, DetectionOptions};
use crate::llm::{ChatMessage, ChatOptions, LlmClient, extract_json_from_response};
use crate::models::{Entity, EntityId, EntityType, Relation, RelationType, normalize_name};
use crate::query::{GlobalSearchEngine, LocalSearchEngine};
use crate::security::api_key::{ApiKey, ApiKeyManager};
use crate::security::audit::{AuditLogger, AuditOutcome};
use crate::security::rate_limit::{InMemoryRateLimitStore, RateLimiter};
use crate::security::rbac::RbacMiddleware;
use crate::security::validation::{FieldSchema, Validator, is_valid_entity_id};
use crate::storage::{GraphStore, Orientation, ProjectionSpec};
use crate::verify::ConsistencyChecker;
use crate::{Error, Result};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Registry of the tools this server exposes.
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Creates the registry with every yagokoro tool.
    #[must_use]
    pub fn new() -> Self {
        let mut tools = HashMap::new();
        for definition in [
            definitions::search_entities_tool(),
            definitions::create_entity_tool(),
            definitions::search_relations_tool(),
            definitions::create_relation_tool(),
            definitions::local_search_tool(),
            definitions::global_search_tool(),
            definitions::detect_communities_tool(),
            definitions::get_entity_graph_tool(),
            definitions::natural_language_query_tool(),
            definitions::chain_of_thought_tool(),
            definitions::validate_response_tool(),
            definitions::check_consistency_tool(),
        ] {
            tools.insert(definition.name.clone(), definition);
        }
        Self { tools }
    }

    /// Looks up a tool definition.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Lists definitions sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<&ToolDefinition> {
        let mut definitions: Vec<&ToolDefinition> = self.tools.values().collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The tool server: registry, engines, and the access-control gate.
pub struct ToolServer {
    registry: ToolRegistry,
    graph: Arc<dyn GraphStore>,
    local: Option<Arc<LocalSearchEngine>>,
    global: Option<Arc<GlobalSearchEngine>>,
    llm: Option<Arc<dyn LlmClient>>,
    keys: Option<Arc<ApiKeyManager>>,
    rbac: RbacMiddleware,
    limiter: Option<RateLimiter<InMemoryRateLimitStore>>,
    audit: Arc<AuditLogger>,
    checker: ConsistencyChecker,
    detection_generation: AtomicU64,
}

impl ToolServer {
    /// Creates a server over a graph store with auth disabled.
    #[must_use]
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self {
            registry: ToolRegistry::new(),
            graph,
            local: None,
            global: None,
            llm: None,
            keys: None,
            rbac: RbacMiddleware::disabled(),
            limiter: None,
            audit: Arc::new(AuditLogger::new(1024)),
            checker: ConsistencyChecker::new(),
            detection_generation: AtomicU64::new(0),
        }
    }

    /// Attaches an LLM client for chain-of-thought reasoning.
    #[must_use]
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Attaches the local search engine.
    #[must_use]
    pub fn with_local_search(mut self, engine: Arc<LocalSearchEngine>) -> Self {
        self.local = Some(engine);
        self
    }

    /// Attaches the global search engine.
    #[must_use]
    pub fn with_global_search(mut self, engine: Arc<GlobalSearchEngine>) -> Self {
        self.global = Some(engine);
        self
    }

    /// Enables authentication and authorization.
    #[must_use]
    pub fn with_auth(mut self, keys: Arc<ApiKeyManager>, rbac: RbacMiddleware) -> Self {
        self.keys = Some(keys);
        self.rbac = rbac;
        self
    }

    /// Enables rate limiting.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: RateLimiter<InMemoryRateLimitStore>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// The tool registry.
    #[must_use]
    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// The audit trail.
    #[must_use]
    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Dispatches a tool call.
    ///
    /// # Errors
    ///
    /// Propagates authentication, authorization, rate-limit, validation,
    /// and handler errors with their §7 kinds intact.
    pub fn dispatch(&self, tool: &str, args: &Value, raw_key: Option<&str>) -> Result<Value> {
        if self.registry.get(tool).is_none() {
            return Err(Error::NotFound {
                resource: format!("tool '{tool}'"),
            });
        }

        // Gate order: authenticate → rate-limit → authorize → validate.
        let key = self.authenticate(raw_key)?;
        self.consume_rate_limit(key.as_ref())?;
        let (operation, resource) = tool_permission(tool);
        self.rbac.authorize(key.as_ref(), operation, resource)?;
        let args = self.validate_args(tool, args).inspect_err(|e| {
            if matches!(e, Error::InjectionDetected { .. }) {
                let actor = key.as_ref().map_or("anonymous", |k| k.id.as_str());
                self.audit.record(actor, tool, AuditOutcome::Blocked, "injection");
            }
        })?;

        self.handle(tool, &args)
    }

    /// Serves a read-only resource by URI.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown URIs.
    pub fn resource(&self, uri: &str) -> Result<Value> {
        match uri {
            "yagokoro://schema/ontology" => Ok(json!({
                "entity_types": EntityType::all().iter().map(|t| t.as_str()).collect::<Vec<_>>(),
                "relation_types": RelationType::all().iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            })),
            "yagokoro://graph/statistics" => {
                let stats = self.graph.stats()?;
                Ok(json!({
                    "entities": stats.entity_count,
                    "relations": stats.relation_count,
                    "communities": stats.community_count,
                }))
            },
            "yagokoro://graph/entities" => {
                let entities = self.graph.all_entities()?;
                Ok(json!(
                    entities
                        .iter()
                        .map(|e| json!({
                            "id": e.id.as_str(),
                            "name": e.name,
                            "type": e.entity_type.as_str(),
                        }))
                        .collect::<Vec<_>>()
                ))
            },
            "yagokoro://graph/timeline" => {
                let records = self.graph.run_template("timeline", &HashMap::new())?;
                Ok(json!(records))
            },
            _ => Err(Error::NotFound {
                resource: format!("resource '{uri}'"),
            }),
        }
    }

    /// A presented key must authenticate; an absent key stays anonymous
    /// and the RBAC gate decides whether the operation is public.
    fn authenticate(&self, raw_key: Option<&str>) -> Result<Option<ApiKey>> {
        match (&self.keys, raw_key) {
            (Some(manager), Some(raw)) => manager.authenticate(Some(raw)).map(Some),
            _ => Ok(None),
        }
    }

    fn consume_rate_limit(&self, key: Option<&ApiKey>) -> Result<()> {
        if let Some(limiter) = &self.limiter {
            let bucket = key.map_or("anonymous", |k| k.id.as_str());
            limiter.consume(bucket)?;
        }
        Ok(())
    }

    fn validate_args(&self, tool: &str, args: &Value) -> Result<HashMap<String, Value>> {
        let map: HashMap<String, Value> = args
            .as_object()
            .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        validator_for(tool).validate(&map)
    }

    #[allow(clippy::too_many_lines)]
    fn handle(&self, tool: &str, args: &HashMap<String, Value>) -> Result<Value> {
        match tool {
            "search_entities" => {
                let query = required_str(args, "query")?;
                let entity_type = args
                    .get("entity_type")
                    .and_then(Value::as_str)
                    .and_then(EntityType::parse);
                let limit = args
                    .get("limit")
                    .and_then(Value::as_u64)
                    .map_or(20, |v| usize::try_from(v).unwrap_or(20));

                let needle = normalize_name(query);
                let mut matches: Vec<Entity> = self
                    .graph
                    .all_entities()?
                    .into_iter()
                    .filter(|e| {
                        entity_type.is_none_or(|t| e.entity_type == t)
                            && e.normalized_name().contains(&needle)
                    })
                    .collect();
                matches.truncate(limit);
                Ok(json!(
                    matches
                        .iter()
                        .map(|e| json!({
                            "id": e.id.as_str(),
                            "name": e.name,
                            "type": e.entity_type.as_str(),
                            "description": e.description,
                        }))
                        .collect::<Vec<_>>()
                ))
            },
            "create_entity" => {
                let name = required_str(args, "name")?;
                let entity_type = EntityType::parse(required_str(args, "entity_type")?)
                    .ok_or_else(|| Error::Validation {
                        field: "entity_type".to_string(),
                        message: "unknown entity type".to_string(),
                    })?;
                let mut entity = Entity::new(entity_type, name);
                if let Some(description) = args.get("description").and_then(Value::as_str) {
                    entity = entity.with_description(description);
                }
                if let Some(confidence) = args.get("confidence").and_then(Value::as_f64) {
                    #[allow(clippy::cast_possible_truncation)]
                    {
                        entity = entity.with_confidence(confidence as f32);
                    }
                }
                let id = self.graph.upsert_entity(entity)?;
                Ok(json!({"id": id.as_str()}))
            },
            "search_relations" => {
                let entity_id = self.checked_entity_id(args, "entity_id")?;
                let relations = self.graph.relations_of(&entity_id)?;
                Ok(json!(
                    relations
                        .iter()
                        .map(|r| json!({
                            "source_id": r.source_id.as_str(),
                            "target_id": r.target_id.as_str(),
                            "type": r.relation_type.as_str(),
                            "confidence": r.confidence,
                        }))
                        .collect::<Vec<_>>()
                ))
            },
            "create_relation" => {
                let source = self.checked_entity_id(args, "source_id")?;
                let target = self.checked_entity_id(args, "target_id")?;
                let relation_type = RelationType::parse(required_str(args, "relation_type")?)
                    .ok_or_else(|| Error::Validation {
                        field: "relation_type".to_string(),
                        message: "unknown relation type".to_string(),
                    })?;
                let mut relation = Relation::new(source, target, relation_type);
                if let Some(confidence) = args.get("confidence").and_then(Value::as_f64) {
                    #[allow(clippy::cast_possible_truncation)]
                    {
                        relation = relation.with_confidence(confidence as f32);
                    }
                }
                self.graph.upsert_relation(relation)?;
                Ok(json!({"created": true}))
            },
            "local_search" => {
                let engine = self.local.as_ref().ok_or_else(engine_missing)?;
                let response = engine.search(required_str(args, "query")?)?;
                serde_json::to_value(&response)
                    .map_err(|e| Error::Fatal(format!("response serialisation failed: {e}")))
            },
            "natural_language_query" => {
                let query = required_str(args, "query")?;
                let response = match args.get("mode").and_then(Value::as_str) {
                    Some("local") => {
                        self.local.as_ref().ok_or_else(engine_missing)?.search(query)?
                    },
                    Some("global") => {
                        self.global.as_ref().ok_or_else(engine_missing)?.search(query)?
                    },
                    Some(other) => {
                        return Err(Error::Validation {
                            field: "mode".to_string(),
                            message: format!("unknown mode '{other}'"),
                        });
                    },
                    // No mode requested: route to whichever engine exists,
                    // preferring entity-level retrieval.
                    None => match (&self.local, &self.global) {
                        (Some(local), _) => local.search(query)?,
                        (None, Some(global)) => global.search(query)?,
                        (None, None) => return Err(engine_missing()),
                    },
                };
                serde_json::to_value(&response)
                    .map_err(|e| Error::Fatal(format!("response serialisation failed: {e}")))
            },
            "chain_of_thought" => self.handle_chain_of_thought(args),
            "global_search" => {
                let engine = self.global.as_ref().ok_or_else(engine_missing)?;
                let response = engine.search(required_str(args, "query")?)?;
                serde_json::to_value(&response)
                    .map_err(|e| Error::Fatal(format!("response serialisation failed: {e}")))
            },
            "detect_communities" => self.handle_detect_communities(args),
            "get_entity_graph" => {
                let entity_id = self.checked_entity_id(args, "entity_id")?;
                let mut params = HashMap::new();
                params.insert("entity_id".to_string(), entity_id.as_str().to_string());
                let records = self.graph.run_template("entity_graph", &params)?;
                Ok(json!(records))
            },
            "validate_response" => {
                let answer = required_str(args, "answer")?;
                let mut context = crate::models::QueryContext::default();
                if let Some(ids) = args.get("entity_ids").and_then(Value::as_array) {
                    for id in ids.iter().filter_map(Value::as_str) {
                        if let Some(entity) = self.graph.get_entity(&EntityId::new(id))? {
                            context.entities.push(entity);
                        }
                    }
                }
                let hallucinated = ConsistencyChecker::hallucinated_entities(answer, &context);
                Ok(json!({
                    "is_grounded": hallucinated.is_empty(),
                    "hallucinated_entities": hallucinated,
                }))
            },
            "check_consistency" => {
                let claims: Vec<String> = args
                    .get("claims")
                    .and_then(Value::as_array)
                    .map(|a| {
                        a.iter()
                            .filter_map(Value::as_str)
                            .map(ToString::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                let report = self.checker.check_claims(&claims);
                serde_json::to_value(&report)
                    .map_err(|e| Error::Fatal(format!("report serialisation failed: {e}")))
            },
            _ => Err(Error::NotFound {
                resource: format!("tool '{tool}'"),
            }),
        }
    }

    /// Answers a question with explicit reasoning steps, grounded in the
    /// entities the question names. The LLM must return
    /// `{"steps": [...], "conclusion": "..."}`; an unparseable response
    /// degrades to a conclusion-only answer.
    fn handle_chain_of_thought(&self, args: &HashMap<String, Value>) -> Result<Value> {
        const CHAIN_OF_THOUGHT_PROMPT: &str = r#"You reason step by step about research literature using ONLY the provided context.
Return ONLY a JSON object: {"steps": ["...", "..."], "conclusion": "..."}
Each step is one inference; the conclusion answers the question.
Never introduce entity names that are absent from the context."#;

        #[derive(serde::Deserialize)]
        struct WireChain {
            #[serde(default)]
            steps: Vec<String>,
            conclusion: String,
        }

        let query = required_str(args, "query")?;
        let llm = self.llm.as_ref().ok_or_else(|| Error::Validation {
            field: "tool".to_string(),
            message: "no LLM client configured on this server".to_string(),
        })?;

        // Ground the reasoning in the entities the question names.
        let needle = normalize_name(query);
        let mut context = String::new();
        let mut grounded = 0usize;
        for entity in self.graph.all_entities()? {
            let name = entity.normalized_name();
            if grounded >= 10 || name.chars().count() < 3 || !needle.contains(&name) {
                continue;
            }
            grounded += 1;
            context.push_str(&format!(
                "- {} ({})\n",
                entity.name,
                entity.entity_type.as_str()
            ));
            for relation in self.graph.relations_of(&entity.id)? {
                context.push_str(&format!(
                    "  {} -[{}]-> {}\n",
                    relation.source_id, relation.relation_type, relation.target_id
                ));
            }
        }

        let response = llm.chat(
            &[
                ChatMessage::system(CHAIN_OF_THOUGHT_PROMPT),
                ChatMessage::user(format!("Context:\n{context}\nQuestion: {query}")),
            ],
            &ChatOptions::default(),
        )?;

        let parsed: Option<WireChain> =
            serde_json::from_str(extract_json_from_response(&response.content)).ok();
        let (steps, conclusion) = parsed.map_or_else(
            || (Vec::new(), response.content.trim().to_string()),
            |wire| (wire.steps, wire.conclusion),
        );

        Ok(json!({
            "query": query,
            "steps": steps,
            "conclusion": conclusion,
            "grounded_entities": grounded,
        }))
    }

    fn handle_detect_communities(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let mut options = DetectionOptions::default();
        if let Some(size) = args.get("min_community_size").and_then(Value::as_u64) {
            options.min_community_size = usize::try_from(size).unwrap_or(2);
        }
        if let Some(levels) = args.get("max_levels").and_then(Value::as_u64) {
            options.max_levels = u32::try_from(levels).unwrap_or(3);
        }

        // Project everything except materialised communities, undirected.
        let generation = self.detection_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let projection_name = format!("detect_g{generation}");
        let entity_types: Vec<EntityType> = EntityType::all()
            .iter()
            .copied()
            .filter(|t| *t != EntityType::Community)
            .collect();
        self.graph.create_projection(ProjectionSpec {
            name: projection_name.clone(),
            entity_types: Some(entity_types),
            relation_types: None,
            orientation: Orientation::Undirected,
        })?;

        let detector = CommunityDetector::new(Arc::clone(&self.graph), options);
        let communities = detector.detect(&projection_name);
        self.graph.drop_projection(&projection_name)?;
        let communities = communities?;

        let persister = CommunityPersister::new(Arc::clone(&self.graph));
        let written = persister.replace_layer(&communities, generation)?;

        Ok(json!({
            "communities": written,
            "levels": communities.iter().map(|c| c.level).max().map_or(0, |l| l + 1),
        }))
    }

    fn checked_entity_id(&self, args: &HashMap<String, Value>, field: &str) -> Result<EntityId> {
        let id = required_str(args, field)?;
        if !is_valid_entity_id(id) {
            return Err(Error::Validation {
                field: field.to_string(),
                message: "must match ^[A-Za-z0-9_-]{1,128}$".to_string(),
            });
        }
        Ok(EntityId::new(id))
    }
}

fn engine_missing() -> Error {
    Error::Validation {
        field: "tool".to_string(),
        message: "search engine not configured on this server".to_string(),
    }
}

fn required_str<'a>(args: &'a HashMap<String, Value>, field: &str) -> Result<&'a str> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Validation {
            field: field.to_string(),
            message: "required string field".to_string(),
        })
}

/// Maps a tool to its `operation:resource` permission pair.
#[must_use]
pub fn tool_permission(tool: &str) -> (&'static str, &'static str) {
    match tool {
        "create_entity" => ("write", "entities"),
        "search_relations" => ("read", "relations"),
        "create_relation" => ("write", "relations"),
        "local_search" | "global_search" | "natural_language_query" | "chain_of_thought"
        | "validate_response" | "check_consistency" => ("read", "search"),
        "detect_communities" => ("write", "communities"),
        // search_entities, get_entity_graph
        _ => ("read", "entities"),
    }
}

/// Input validator per tool; string fields are injection-checked.
fn validator_for(tool: &str) -> Validator {
    match tool {
        "create_entity" => Validator::new()
            .field("name", FieldSchema::text().length(1, 512))
            .field("entity_type", FieldSchema::text().length(1, 64))
            .field("description", FieldSchema::text().optional().length(0, 4096))
            .field("confidence", FieldSchema::float().optional().range(0.0, 1.0)),
        "create_relation" => Validator::new()
            .field("source_id", FieldSchema::text().length(1, 128))
            .field("target_id", FieldSchema::text().length(1, 128))
            .field("relation_type", FieldSchema::text().length(1, 64))
            .field("confidence", FieldSchema::float().optional().range(0.0, 1.0)),
        "search_relations" | "get_entity_graph" => Validator::new()
            .field("entity_id", FieldSchema::text().length(1, 128))
            .field("depth", FieldSchema::integer().optional().range(1.0, 4.0)),
        "local_search" | "global_search" | "chain_of_thought" => {
            Validator::new().field("query", FieldSchema::text().length(1, 1000))
        },
        "natural_language_query" => Validator::new()
            .field("query", FieldSchema::text().length(1, 1000))
            .field("mode", FieldSchema::text().optional().length(1, 16)),
        "validate_response" => Validator::new().field("answer", FieldSchema::text().length(1, 10_000)),
        "search_entities" => Validator::new()
            .field("query", FieldSchema::text().length(1, 512))
            .field("entity_type", FieldSchema::text().optional().length(1, 64))
            .field("limit", FieldSchema::integer().optional().range(1.0, 100.0)),
        // detect_communities, check_consistency: structural checks happen in
        // the handler; non-string fields carry no injection surface.
        _ => Validator::new(),
    }
}
