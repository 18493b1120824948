//! Versioned JSON backup archives.
//!
//! An archive serialises the graph (entities, relations) together with the
//! vector payloads. Restores merge with the same rules as ingestion, so
//! restoring into a non-empty store is idempotent and an export/import
//! round-trip reproduces the graph node-for-node, edge-for-edge.

use crate::models::{Entity, Relation};
use crate::storage::{GraphStore, VectorPayload, VectorStore};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Current archive format version.
pub const ARCHIVE_VERSION: u32 = 1;

/// A serialised snapshot of the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupArchive {
    /// Format version; restores reject unknown versions.
    pub version: u32,
    /// Unix timestamp of the export.
    pub created_at: u64,
    /// Every entity, sorted by ID.
    pub entities: Vec<Entity>,
    /// Every relation.
    pub relations: Vec<Relation>,
    /// Vector payloads keyed by entity ID (vectors themselves are
    /// re-derivable from the embedder and are not archived).
    pub vector_payloads: Vec<(String, VectorPayload)>,
}

impl BackupArchive {
    /// Serialises the archive to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fatal`] if serialisation fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Fatal(format!("archive serialisation failed: {e}")))
    }

    /// Parses an archive from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for malformed JSON or an unsupported
    /// version.
    pub fn from_json(json: &str) -> Result<Self> {
        let archive: Self = serde_json::from_str(json).map_err(|e| Error::Validation {
            field: "archive".to_string(),
            message: format!("malformed archive: {e}"),
        })?;
        if archive.version != ARCHIVE_VERSION {
            return Err(Error::Validation {
                field: "version".to_string(),
                message: format!(
                    "unsupported archive version {} (expected {ARCHIVE_VERSION})",
                    archive.version
                ),
            });
        }
        Ok(archive)
    }
}

/// Exports and restores [`BackupArchive`]s.
pub struct BackupService {
    graph: Arc<dyn GraphStore>,
    vectors: Option<Arc<dyn VectorStore>>,
}

impl BackupService {
    /// Creates a backup service over the graph store.
    #[must_use]
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self {
            graph,
            vectors: None,
        }
    }

    /// Includes vector payloads in archives.
    #[must_use]
    pub fn with_vectors(mut self, vectors: Arc<dyn VectorStore>) -> Self {
        self.vectors = Some(vectors);
        self
    }

    /// Exports the current graph into an archive.
    ///
    /// # Errors
    ///
    /// Returns an error if store reads fail.
    pub fn export(&self) -> Result<BackupArchive> {
        let entities = self.graph.all_entities()?;
        let relations = self.graph.all_relations()?;
        let vector_payloads = match &self.vectors {
            Some(vectors) => vectors
                .all_payloads()?
                .into_iter()
                .map(|(id, payload)| (id.as_str().to_string(), payload))
                .collect(),
            None => Vec::new(),
        };
        Ok(BackupArchive {
            version: ARCHIVE_VERSION,
            created_at: crate::current_timestamp(),
            entities,
            relations,
            vector_payloads,
        })
    }

    /// Restores an archive with merge semantics.
    ///
    /// Entities restore before relations (the same ordering guarantee as
    /// ingestion). Restoring the same archive twice converges to the same
    /// state. Returns `(entities, relations)` restored.
    ///
    /// # Errors
    ///
    /// Returns an error if a store write fails.
    pub fn restore(&self, archive: &BackupArchive) -> Result<(usize, usize)> {
        for entity in &archive.entities {
            self.graph.upsert_entity(entity.clone())?;
        }
        let mut relations_restored = 0;
        for relation in &archive.relations {
            match self.graph.upsert_relation(relation.clone()) {
                Ok(()) => relations_restored += 1,
                // A relation whose endpoints were merged away is skipped,
                // not fatal.
                Err(Error::Conflict { diagnostic }) => {
                    tracing::warn!(diagnostic, "skipping unrestorable relation");
                },
                Err(e) => return Err(e),
            }
        }
        Ok((archive.entities.len(), relations_restored))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{EntityId, EntityType, RelationType};
    use crate::storage::InMemoryGraphStore;

    fn seeded() -> Arc<InMemoryGraphStore> {
        let graph = Arc::new(InMemoryGraphStore::new());
        graph
            .upsert_entity(
                Entity::new(EntityType::AiModel, "GPT-4")
                    .with_id(EntityId::new("gpt4"))
                    .with_source_chunk("c1"),
            )
            .unwrap();
        graph
            .upsert_entity(
                Entity::new(EntityType::Organization, "OpenAI").with_id(EntityId::new("openai")),
            )
            .unwrap();
        graph
            .upsert_relation(
                Relation::new(
                    EntityId::new("gpt4"),
                    EntityId::new("openai"),
                    RelationType::DevelopedBy,
                )
                .with_confidence(0.95),
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_export_import_round_trip() {
        let source = seeded();
        let service = BackupService::new(Arc::clone(&source) as Arc<dyn GraphStore>);
        let archive = service.export().unwrap();
        let json = archive.to_json().unwrap();

        let target = Arc::new(InMemoryGraphStore::new());
        let restore_service = BackupService::new(Arc::clone(&target) as Arc<dyn GraphStore>);
        let parsed = BackupArchive::from_json(&json).unwrap();
        restore_service.restore(&parsed).unwrap();

        assert_eq!(
            source.all_entities().unwrap(),
            target.all_entities().unwrap()
        );
        assert_eq!(
            source.all_relations().unwrap(),
            target.all_relations().unwrap()
        );
    }

    #[test]
    fn test_restore_is_idempotent() {
        let source = seeded();
        let service = BackupService::new(Arc::clone(&source) as Arc<dyn GraphStore>);
        let archive = service.export().unwrap();

        let target = Arc::new(InMemoryGraphStore::new());
        let restore_service = BackupService::new(Arc::clone(&target) as Arc<dyn GraphStore>);
        restore_service.restore(&archive).unwrap();
        let after_first = target.all_entities().unwrap();
        restore_service.restore(&archive).unwrap();
        assert_eq!(after_first, target.all_entities().unwrap());
        assert_eq!(target.stats().unwrap().relation_count, 1);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let json = r#"{"version": 99, "created_at": 0, "entities": [], "relations": [], "vector_payloads": []}"#;
        let err = BackupArchive::from_json(json).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
