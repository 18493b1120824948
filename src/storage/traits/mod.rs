//! Storage backend traits.

pub mod graph;
pub mod vector;

pub use graph::{
    GraphProjection, GraphStats, GraphStore, Orientation, ProjectionSpec, TraversalRecord,
    TraversalResult,
};
pub use vector::{VectorHit, VectorPayload, VectorStore, cosine_similarity};
