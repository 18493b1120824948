//! Vector storage backends.

mod memory;

pub use memory::InMemoryVectorStore;

pub use crate::storage::traits::vector::{VectorHit, VectorPayload, VectorStore};
