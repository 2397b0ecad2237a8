// Retrieval module
// Embeds queries and delegates ranking to the vector store


use std::sync::Arc;

use tracing::debug;

use crate::embeddings::Embedder;
use crate::store::{RetrievalResult, VectorStore};
use crate::{QagenError, Result};

/// Answers queries against an ingested knowledge base.
///
/// Holds the same embedder used at ingestion time so query vectors live in
/// the same space as the stored chunks.
pub struct RetrievalEngine {
    embedder: Arc<dyn Embedder>,
}

impl RetrievalEngine {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Retrieve up to `top_k` chunks relevant to `query`, in the store's
    /// native ascending-distance order. No re-ranking, deduplication, or
    /// distance threshold is applied; an empty result means no relevant
    /// content and is a valid outcome, not an error.
    #[inline]
    pub async fn retrieve(
        &self,
        store: &dyn VectorStore,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let vectors = self.embedder.embed(&[query.to_string()])?;
        let query_vector = vectors.into_iter().next().ok_or_else(|| {
            QagenError::Embedding("embedder returned no vector for query".to_string())
        })?;

        debug!(
            "Retrieving top {} chunks for query ({} chars)",
            top_k,
            query.len()
        );

        store.search(&query_vector, top_k).await
    }
}
