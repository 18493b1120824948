//! Community subsystem: detection, summarisation, persistence.
//!
//! Detection partitions a graph projection with seeded label propagation
//! (or a connected-components fallback), optionally agglomerating into a
//! hierarchy. Summaries are LLM-generated and idempotent; the stored layer
//! is replaced via a staged shadow swap.

pub mod detect;
pub mod persist;
pub mod summarize;

pub use detect::{
    CommunityDetector, DetectionAlgorithm, DetectionOptions, connected_components,
    hierarchical_communities, label_propagation, projection_adjacency, stable_seed,
};
pub use persist::CommunityPersister;
pub use summarize::{CommunitySummarizer, SummarizerOptions};
