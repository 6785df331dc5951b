//! Embedding provider trait.

use async_trait::async_trait;

use crate::error::Result;

/// Turns text into fixed-length vectors.
///
/// One provider instance is shared by ingestion and retrieval so that chunks
/// and questions are embedded into the same space. Implementations must be
/// deterministic for a fixed model and always return vectors of
/// [`dimensions`](EmbeddingProvider::dimensions) elements.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning one vector per input in input order.
    ///
    /// The default implementation awaits [`embed`](EmbeddingProvider::embed)
    /// for each input in turn.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Output dimensionality of the model; used to size new collections.
    fn dimensions(&self) -> usize;
}
