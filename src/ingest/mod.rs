//! Ingestion pipeline: text chunks → entities, relations, concepts.
//!
//! Stage order inside one document is fixed (entities → relations →
//! merge); documents fan out in parallel. Concept extraction and concept
//! graph construction are deterministic and LLM-free.

pub mod concept_extractor;
pub mod concept_graph;
pub mod entity_extractor;
pub mod merge;
pub mod pdf;
pub mod pipeline;
pub mod relation_extractor;

pub use concept_extractor::{ConceptExtraction, ConceptExtractor, ConceptExtractorOptions};
pub use concept_graph::{ConceptGraphBuilder, ConceptGraphOptions};
pub use entity_extractor::{
    EntityExtraction, EntityExtractor, ExtractedEntity, ExtractionMetadata, ExtractorOptions,
};
pub use merge::GraphMerger;
pub use pdf::{PdfExtraction, PdfExtractor, PdfPage, chunks_from_extraction};
pub use pipeline::{DocumentStatus, IngestionPipeline, PipelineOptions};
pub use relation_extractor::{
    ExtractedRelation, RelationExtraction, RelationExtractor, RelationExtractorOptions,
};
