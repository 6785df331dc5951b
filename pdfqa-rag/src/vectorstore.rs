//! Vector store trait for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{CollectionInfo, DistanceMetric, IndexedVector, SearchResult};
use crate::error::Result;

/// A storage backend holding named collections of [`IndexedVector`]s.
///
/// The store is the only durable owner of indexed data. Implementations
/// report missing collections as [`RagError::CollectionNotFound`] and a
/// creation race lost to another writer as
/// [`RagError::CollectionCreateConflict`].
///
/// [`RagError::CollectionNotFound`]: crate::RagError::CollectionNotFound
/// [`RagError::CollectionCreateConflict`]: crate::RagError::CollectionCreateConflict
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{DistanceMetric, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 768, DistanceMetric::Cosine).await?;
/// store.upsert("docs", &points).await?;
/// let results = store.search("docs", &query_embedding, 4).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Names of all existing collections.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Vector parameters of an existing collection.
    async fn describe_collection(&self, name: &str) -> Result<CollectionInfo>;

    /// Create a collection. Fails with `CollectionCreateConflict` if the name is taken.
    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()>;

    /// Delete a collection and every vector in it.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert points, replacing any point with the same chunk id.
    async fn upsert(&self, collection: &str, points: &[IndexedVector]) -> Result<()>;

    /// The `top_k` points most similar to `embedding`, by descending score.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;
}
