// Embeddings module
// Chunking policy and the embedding capability consumed by the pipeline

pub mod chunking;
pub mod ollama;

use crate::Result;

/// Maps text to a fixed-length vector. The same provider (and model) must be
/// used when building the index and when embedding queries; the semantic
/// spaces are not comparable otherwise.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}
