//! Domain models for the knowledge graph and its retrieval engines.

pub mod chunk;
pub mod community;
pub mod concept;
pub mod entity;
pub mod path;
pub mod query;
pub mod relation;

pub use chunk::{ChunkMetadata, TextChunk};
pub use community::{Community, CommunityId};
pub use concept::{Concept, ConceptCooccurrence, ConceptGraph};
pub use entity::{Entity, EntityId, EntityType, PropertyValue, normalize_name};
pub use path::{GraphPath, PathResult};
pub use query::{
    Citation, CitationSource, QueryContext, QueryMetrics, QueryResponse, QueryType, SearchMode,
};
pub use relation::{Relation, RelationKey, RelationType};
