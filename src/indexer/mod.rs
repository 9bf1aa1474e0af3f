// Indexer module
// Orchestrates load -> chunk -> embed -> persist for full index rebuilds

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::documents::DocumentSource;
use crate::embeddings::EmbeddingProvider;
use crate::embeddings::chunking::{ChunkingConfig, split_documents};
use crate::index::{IndexEntry, VectorIndex};
use crate::{RagError, Result};

/// Counts reported after a successful rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildSummary {
    pub documents: usize,
    pub chunks: usize,
}

/// Rebuilds the persisted vector index from a document source.
///
/// A rebuild is all-or-nothing: a failure embedding any chunk aborts the
/// whole rebuild and no partial index is persisted. Rebuilding twice from
/// identical inputs produces a functionally equivalent index.
pub struct IndexBuilder {
    source: Box<dyn DocumentSource>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
}

impl IndexBuilder {
    #[inline]
    pub fn new(
        source: Box<dyn DocumentSource>,
        embedder: Arc<dyn EmbeddingProvider>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            source,
            embedder,
            chunking,
        }
    }

    /// Rebuild the index at `persist_path`, replacing any existing index.
    #[inline]
    pub async fn rebuild(&self, persist_path: &Path) -> Result<RebuildSummary> {
        let documents = self.source.load()?;
        info!("Loaded {} documents", documents.len());

        let chunks = split_documents(&documents, &self.chunking)?;
        info!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        if let Some(sample) = chunks.get(chunks.len() / 2) {
            debug!(
                "Sample chunk {}@{} ({}): {}",
                sample.source_path, sample.start_offset, sample.chunk_index, sample.text
            );
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;

        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "Embedded {} chunks but received {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        if let Some(first) = vectors.first() {
            let dimension = first.len();
            if let Some(bad) = vectors.iter().position(|v| v.len() != dimension) {
                return Err(RagError::Embedding(format!(
                    "Chunk {} was embedded with dimension {} but expected {}",
                    bad,
                    vectors[bad].len(),
                    dimension
                )));
            }
        }

        let entries: Vec<IndexEntry> = chunks
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry::new(chunk, vector))
            .collect();

        VectorIndex::create(persist_path, &entries).await?;

        info!(
            "Rebuilt index at {} with {} entries",
            persist_path.display(),
            entries.len()
        );

        Ok(RebuildSummary {
            documents: documents.len(),
            chunks: chunks.len(),
        })
    }
}
