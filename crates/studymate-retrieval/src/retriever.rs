use std::sync::Arc;

use studymate_vector::{EmbeddingIndex, DEFAULT_TOP_K};

use crate::ranker::{rank, NO_RELEVANT_CONTEXT};

/// Index query plus ranking; the single context string handed to the composer.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<EmbeddingIndex>,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<EmbeddingIndex>) -> Self {
        Self { index, top_k: DEFAULT_TOP_K }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> { &self.index }

    pub fn top_k(&self) -> usize { self.top_k }

    /// Never fails: index or embedding errors are logged and reported as
    /// [`NO_RELEVANT_CONTEXT`].
    pub async fn relevant_context(&self, query: &str) -> String {
        match self.index.query(query, self.top_k).await {
            Ok(results) => {
                tracing::debug!(hits = results.len(), "retrieved neighbors");
                rank(query, &results)
            }
            Err(e) => {
                tracing::warn!(error = %e, "retrieval failed; continuing without context");
                NO_RELEVANT_CONTEXT.to_string()
            }
        }
    }
}
