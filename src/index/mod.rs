// Vector index module
// Persisted chunk embeddings and similarity search via LanceDB

pub mod vector_index;

use chrono::Utc;
use uuid::Uuid;

use crate::embeddings::chunking::Chunk;

pub use vector_index::VectorIndex;

/// A chunk together with its embedding vector, persisted as a unit. The
/// vector index owns all entries for its lifetime; a rebuild replaces them
/// en masse.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Unique identifier for this entry
    pub id: String,
    /// The embedding vector for the chunk text
    pub vector: Vec<f32>,
    /// The chunk payload
    pub chunk: Chunk,
    /// Timestamp when this entry was created
    pub created_at: String,
}

impl IndexEntry {
    #[inline]
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vector,
            chunk,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A chunk returned from similarity search, with its relevance score.
/// Ephemeral, produced per query, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    /// Cosine similarity rescaled to `[0, 1]`; higher is more relevant
    pub relevance_score: f32,
}
