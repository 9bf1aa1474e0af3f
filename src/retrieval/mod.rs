// Retrieval module
// Query-time embedding, top-k similarity search, and relevance filtering


use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::Result;
use crate::embeddings::EmbeddingProvider;
use crate::index::{RetrievalResult, VectorIndex};

/// Configuration for query-time retrieval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum number of chunks retrieved per query
    pub top_k: usize,
    /// Results scoring below this are dropped; `None` disables filtering
    pub min_relevance: Option<f32>,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 3,
            min_relevance: None,
        }
    }
}

/// Outcome of a retrieval. Finding nothing relevant is a normal terminal
/// state, distinct from both a missing index (`NotFound` at open time) and
/// upstream failures.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalOutcome {
    Results(Vec<RetrievalResult>),
    NoRelevantResults,
}

/// Embeds queries and searches the vector index.
///
/// Precondition: the embedding provider must be the same model that built
/// the index; a mismatched model is a caller configuration error and is not
/// detected beyond vector dimensionality.
pub struct Retriever {
    index: VectorIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
}

impl Retriever {
    #[inline]
    pub fn new(
        index: VectorIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            config,
        }
    }

    /// Retrieve the chunks most relevant to `query`, filtered by the
    /// configured minimum relevance.
    #[inline]
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalOutcome> {
        let query_vector = self.embedder.embed(query)?;

        let results = self.index.search(&query_vector, self.config.top_k).await?;
        debug!("Search returned {} candidates", results.len());

        let filtered: Vec<RetrievalResult> = match self.config.min_relevance {
            Some(min_relevance) => results
                .into_iter()
                .filter(|result| result.relevance_score >= min_relevance)
                .collect(),
            None => results,
        };

        if filtered.is_empty() {
            debug!("No results at or above the relevance threshold");
            return Ok(RetrievalOutcome::NoRelevantResults);
        }

        Ok(RetrievalOutcome::Results(filtered))
    }
}
