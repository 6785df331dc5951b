//! Collection lifecycle and chunk indexing.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::document::{Chunk, CollectionInfo, DistanceMetric, IndexedVector};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Most texts sent to the embedder in one `embed_batch` call.
pub const MAX_EMBED_BATCH: usize = 100;

/// Creates collections on demand and writes embedded chunks into them.
///
/// Several ingestions may race to create the same collection; the loser's
/// [`RagError::CollectionCreateConflict`] is treated as success once the
/// existing collection is confirmed to be compatible.
pub struct VectorIndexManager {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    upsert_batch_size: usize,
}

impl VectorIndexManager {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        upsert_batch_size: usize,
    ) -> Self {
        Self { embedder, store, upsert_batch_size: upsert_batch_size.max(1) }
    }

    /// Make sure `name` exists with the given vector parameters.
    ///
    /// Idempotent: calling it again for an existing, compatible collection
    /// changes nothing.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmbeddingDimensionMismatch`] if the collection exists with another dimension
    /// - [`RagError::DistanceMetricMismatch`] if it exists with another metric
    /// - [`RagError::VectorStoreFailed`] if the store cannot be reached
    pub async fn ensure_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<CollectionInfo> {
        let existing = self.store.list_collections().await?;
        if existing.iter().any(|c| c == name) {
            debug!(collection = name, "collection already exists");
            return self.check_compatible(name, dimensions, metric).await;
        }

        match self.store.create_collection(name, dimensions, metric).await {
            Ok(()) => {
                info!(collection = name, dimensions, metric = %metric, "created collection");
                Ok(CollectionInfo { name: name.to_string(), dimensions, metric })
            }
            Err(RagError::CollectionCreateConflict(_)) => {
                warn!(collection = name, "collection created concurrently, verifying parameters");
                self.check_compatible(name, dimensions, metric).await
            }
            Err(e) => {
                error!(collection = name, error = %e, "failed to create collection");
                Err(e)
            }
        }
    }

    async fn check_compatible(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<CollectionInfo> {
        let info = self.store.describe_collection(name).await?;
        if info.dimensions != dimensions {
            return Err(RagError::EmbeddingDimensionMismatch {
                collection: name.to_string(),
                expected: info.dimensions,
                actual: dimensions,
            });
        }
        if info.metric != metric {
            return Err(RagError::DistanceMetricMismatch {
                collection: name.to_string(),
                expected: info.metric,
                actual: metric,
            });
        }
        Ok(info)
    }

    /// Embed `chunks` and upsert them into `collection`.
    ///
    /// Texts go to the embedder in slices of at most `upsert_batch_size`
    /// (capped at [`MAX_EMBED_BATCH`]). Vectors are checked against the
    /// collection's dimension before anything is written. Points are sent in batches; a failing batch aborts the call
    /// and leaves earlier batches in place. Returns the number of points written.
    ///
    /// # Errors
    ///
    /// - [`RagError::CollectionNotFound`] if the collection does not exist
    /// - [`RagError::EmbeddingFailed`] if the provider fails
    /// - [`RagError::EmbeddingDimensionMismatch`] if a vector has the wrong length
    /// - [`RagError::VectorStoreFailed`] if a write fails
    pub async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            debug!(collection, "nothing to index");
            return Ok(0);
        }

        let info = self.store.describe_collection(collection).await?;

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for (batch, slice) in texts.chunks(self.upsert_batch_size.min(MAX_EMBED_BATCH)).enumerate() {
            let vectors = self.embedder.embed_batch(slice).await.map_err(|e| {
                error!(collection, batch, error = %e, "embedding failed during indexing");
                e
            })?;
            debug!(collection, batch, texts = slice.len(), "embedded batch");
            embeddings.extend(vectors);
        }

        if embeddings.len() != chunks.len() {
            return Err(RagError::EmbeddingFailed {
                provider: "embedder".into(),
                message: format!("expected {} embeddings, got {}", chunks.len(), embeddings.len()),
            });
        }
        if let Some(bad) = embeddings.iter().find(|v| v.len() != info.dimensions) {
            return Err(RagError::EmbeddingDimensionMismatch {
                collection: collection.to_string(),
                expected: info.dimensions,
                actual: bad.len(),
            });
        }

        let points: Vec<IndexedVector> =
            chunks.iter().zip(embeddings).map(|(chunk, vector)| IndexedVector::new(chunk, vector)).collect();

        for (batch, slice) in points.chunks(self.upsert_batch_size).enumerate() {
            self.store.upsert(collection, slice).await.map_err(|e| {
                error!(collection, batch, error = %e, "upsert failed during indexing");
                e
            })?;
            debug!(collection, batch, points = slice.len(), "upserted batch");
        }

        info!(collection, points = points.len(), "indexed chunks");
        Ok(points.len())
    }
}
