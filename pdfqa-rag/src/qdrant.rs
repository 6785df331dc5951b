//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfqa_rag::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334", None)?;
//! store.create_collection("docs", 768, DistanceMetric::Cosine).await?;
//! store.upsert("docs", &points).await?;
//! let results = store.search("docs", &query_embedding, 4).await?;
//! ```

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, ScoredPoint, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::document::{Chunk, CollectionInfo, DistanceMetric, IndexedVector, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "qdrant";

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// Each point carries the chunk text and its [`ChunkMetadata`](crate::ChunkMetadata)
/// as payload; the point id is the chunk id.
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Connect to the given URL, optionally authenticating with an API key.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self> {
        let client = Qdrant::from_url(url).api_key(api_key).build().map_err(Self::map_err)?;
        Ok(Self { client })
    }

    /// Connect to a local instance at `http://localhost:6334`.
    pub fn default_url() -> Result<Self> {
        Self::new("http://localhost:6334", None)
    }

    /// Wrap an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::VectorStoreFailed { backend: BACKEND.to_string(), message: e.to_string() }
    }

    fn to_distance(metric: DistanceMetric) -> Distance {
        match metric {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::Dot => Distance::Dot,
            DistanceMetric::Euclid => Distance::Euclid,
        }
    }

    fn from_distance(collection: &str, distance: i32) -> Result<DistanceMetric> {
        match Distance::try_from(distance) {
            Ok(Distance::Cosine) => Ok(DistanceMetric::Cosine),
            Ok(Distance::Dot) => Ok(DistanceMetric::Dot),
            Ok(Distance::Euclid) => Ok(DistanceMetric::Euclid),
            _ => Err(RagError::VectorStoreFailed {
                backend: BACKEND.to_string(),
                message: format!("collection '{collection}' uses unsupported distance {distance}"),
            }),
        }
    }

    async fn ensure_exists(&self, collection: &str) -> Result<()> {
        if self.client.collection_exists(collection).await.map_err(Self::map_err)? {
            Ok(())
        } else {
            Err(RagError::CollectionNotFound(collection.to_string()))
        }
    }

    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn to_point(point: &IndexedVector) -> Result<PointStruct> {
        let payload = Payload::try_from(json!({
            "text": point.text,
            "source_filename": point.metadata.source_filename,
            "chunk_id": point.metadata.chunk_id.to_string(),
        }))
        .map_err(Self::map_err)?;
        Ok(PointStruct::new(point.chunk_id.to_string(), point.vector.clone(), payload))
    }

    fn to_result(scored: ScoredPoint) -> Option<SearchResult> {
        let id = match scored.id.as_ref().and_then(|pid| pid.point_id_options.as_ref()) {
            Some(PointIdOptions::Uuid(s)) => Uuid::parse_str(s).ok()?,
            _ => return None,
        };
        let text = scored.payload.get("text").and_then(Self::extract_string)?;
        let source_filename =
            scored.payload.get("source_filename").and_then(Self::extract_string).unwrap_or_default();

        Some(SearchResult { chunk: Chunk { id, text, source_filename }, score: scored.score })
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self.client.list_collections().await.map_err(Self::map_err)?;
        Ok(response.collections.into_iter().map(|c| c.name).collect())
    }

    async fn describe_collection(&self, name: &str) -> Result<CollectionInfo> {
        self.ensure_exists(name).await?;
        let response = self.client.collection_info(name).await.map_err(Self::map_err)?;

        let params = response
            .result
            .and_then(|info| info.config)
            .and_then(|config| config.params)
            .and_then(|params| params.vectors_config)
            .and_then(|vectors| vectors.config);

        match params {
            Some(VectorsConfigKind::Params(params)) => Ok(CollectionInfo {
                name: name.to_string(),
                dimensions: params.size as usize,
                metric: Self::from_distance(name, params.distance)?,
            }),
            _ => Err(RagError::VectorStoreFailed {
                backend: BACKEND.to_string(),
                message: format!("collection '{name}' has no single unnamed vector configuration"),
            }),
        }
    }

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        let request = CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
            dimensions as u64,
            Self::to_distance(metric),
        ));

        if let Err(e) = self.client.create_collection(request).await {
            // Creation fails when another writer got there first.
            if self.client.collection_exists(name).await.map_err(Self::map_err)? {
                warn!(collection = name, error = %e, "qdrant collection created concurrently");
                return Err(RagError::CollectionCreateConflict(name.to_string()));
            }
            return Err(Self::map_err(e));
        }

        debug!(collection = name, dimensions, %metric, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.client.delete_collection(name).await.map_err(Self::map_err)?;
        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[IndexedVector]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let structs = points.iter().map(Self::to_point).collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, structs).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection, count = points.len(), "upserted points to qdrant");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.ensure_exists(collection).await?;

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, embedding.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(Self::map_err)?;

        Ok(response.result.into_iter().filter_map(Self::to_result).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_mapping_round_trips() {
        for metric in [DistanceMetric::Cosine, DistanceMetric::Dot, DistanceMetric::Euclid] {
            let distance = QdrantVectorStore::to_distance(metric) as i32;
            assert_eq!(QdrantVectorStore::from_distance("docs", distance).unwrap(), metric);
        }
    }

    #[test]
    fn manhattan_is_rejected() {
        let err = QdrantVectorStore::from_distance("docs", Distance::Manhattan as i32).unwrap_err();
        assert!(matches!(err, RagError::VectorStoreFailed { .. }));
    }
}
