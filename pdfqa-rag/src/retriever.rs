//! Similarity retrieval for questions.

use std::sync::Arc;

use tracing::{debug, error};

use crate::document::RetrievedContext;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::vectorstore::VectorStore;

/// Embeds a question and fetches the most similar chunks of a collection.
///
/// Must share its [`EmbeddingProvider`] with the indexer so that questions
/// and chunks live in the same vector space.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    default_top_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        default_top_k: usize,
    ) -> Self {
        Self { embedder, store, default_top_k }
    }

    /// Retrieve the configured number of chunks for `question`.
    pub async fn retrieve(&self, question: &str, collection: &str) -> Result<RetrievedContext> {
        self.retrieve_top_k(question, collection, self.default_top_k).await
    }

    /// Retrieve at most `top_k` chunks for `question`, most similar first.
    ///
    /// Returns fewer than `top_k` results when the collection holds fewer
    /// points, and an empty context for an existing but empty collection.
    ///
    /// # Errors
    ///
    /// - [`RagError::CollectionNotFound`](crate::RagError::CollectionNotFound) if nothing was ingested into `collection`
    /// - [`RagError::EmbeddingFailed`](crate::RagError::EmbeddingFailed) if the question cannot be embedded
    pub async fn retrieve_top_k(
        &self,
        question: &str,
        collection: &str,
        top_k: usize,
    ) -> Result<RetrievedContext> {
        let query = self.embedder.embed(question).await.map_err(|e| {
            error!(collection, error = %e, "question embedding failed");
            e
        })?;

        let results = self.store.search(collection, &query, top_k).await.map_err(|e| {
            error!(collection, error = %e, "vector store search failed");
            e
        })?;

        debug!(collection, top_k, result_count = results.len(), "retrieved context");
        Ok(RetrievedContext::new(results))
    }
}
