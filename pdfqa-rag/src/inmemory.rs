//! In-memory vector store.
//!
//! [`InMemoryVectorStore`] keeps every collection in a `HashMap` behind a
//! `tokio::sync::RwLock`. It is meant for development and tests, and enforces
//! the same collection rules as a real backend: fixed dimensionality and
//! explicit creation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::document::{CollectionInfo, DistanceMetric, IndexedVector, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

#[derive(Debug)]
struct Collection {
    info: CollectionInfo,
    /// Points in insertion order; search ties keep this order.
    points: Vec<IndexedVector>,
    positions: HashMap<Uuid, usize>,
}

/// An in-memory [`VectorStore`].
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{DistanceMetric, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 384, DistanceMetric::Cosine).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points stored in a collection.
    pub async fn point_count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|c| c.points.len())
            .ok_or_else(|| RagError::CollectionNotFound(collection.to_string()))
    }
}

/// Cosine similarity; 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Negated Euclidean distance, so that higher is closer.
fn neg_euclidean(a: &[f32], b: &[f32]) -> f32 {
    -a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine_similarity(a, b),
        DistanceMetric::Dot => dot(a, b),
        DistanceMetric::Euclid => neg_euclidean(a, b),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn describe_collection(&self, name: &str) -> Result<CollectionInfo> {
        let collections = self.collections.read().await;
        collections
            .get(name)
            .map(|c| c.info.clone())
            .ok_or_else(|| RagError::CollectionNotFound(name.to_string()))
    }

    async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(RagError::CollectionCreateConflict(name.to_string()));
        }
        collections.insert(
            name.to_string(),
            Collection {
                info: CollectionInfo { name: name.to_string(), dimensions, metric },
                points: Vec::new(),
                positions: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[IndexedVector]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections
            .get_mut(collection)
            .ok_or_else(|| RagError::CollectionNotFound(collection.to_string()))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != store.info.dimensions) {
            return Err(RagError::EmbeddingDimensionMismatch {
                collection: collection.to_string(),
                expected: store.info.dimensions,
                actual: bad.vector.len(),
            });
        }

        for point in points {
            match store.positions.get(&point.chunk_id) {
                Some(&index) => store.points[index] = point.clone(),
                None => {
                    store.positions.insert(point.chunk_id, store.points.len());
                    store.points.push(point.clone());
                }
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let store = collections
            .get(collection)
            .ok_or_else(|| RagError::CollectionNotFound(collection.to_string()))?;

        if embedding.len() != store.info.dimensions {
            return Err(RagError::EmbeddingDimensionMismatch {
                collection: collection.to_string(),
                expected: store.info.dimensions,
                actual: embedding.len(),
            });
        }

        let metric = store.info.metric;
        let mut scored: Vec<SearchResult> = store
            .points
            .iter()
            .map(|point| SearchResult {
                chunk: point.to_chunk(),
                score: score(metric, &point.vector, embedding),
            })
            .collect();

        // Stable sort: equal scores stay in insertion order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    fn point(text: &str, vector: Vec<f32>) -> IndexedVector {
        let chunk = Chunk { id: Uuid::new_v4(), text: text.into(), source_filename: "a.pdf".into() };
        IndexedVector::new(&chunk, vector)
    }

    #[tokio::test]
    async fn second_create_is_a_conflict() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2, DistanceMetric::Cosine).await.unwrap();
        let err = store.create_collection("docs", 2, DistanceMetric::Cosine).await.unwrap_err();

        assert!(matches!(err, RagError::CollectionCreateConflict(name) if name == "docs"));
        assert_eq!(store.list_collections().await.unwrap(), vec!["docs".to_string()]);
    }

    #[tokio::test]
    async fn euclid_ranks_nearest_first() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2, DistanceMetric::Euclid).await.unwrap();
        store
            .upsert("docs", &[point("far", vec![10.0, 10.0]), point("near", vec![1.0, 1.0])])
            .await
            .unwrap();

        let results = store.search("docs", &[0.0, 0.0], 2).await.unwrap();
        assert_eq!(results[0].chunk.text, "near");
        assert_eq!(results[1].chunk.text, "far");
    }

    #[tokio::test]
    async fn equal_scores_keep_insertion_order() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2, DistanceMetric::Cosine).await.unwrap();
        store
            .upsert(
                "docs",
                &[
                    point("first", vec![1.0, 0.0]),
                    point("second", vec![2.0, 0.0]),
                    point("third", vec![3.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let results = store.search("docs", &[1.0, 0.0], 3).await.unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn upsert_replaces_same_chunk_id() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2, DistanceMetric::Cosine).await.unwrap();
        let mut p = point("old", vec![1.0, 0.0]);
        store.upsert("docs", std::slice::from_ref(&p)).await.unwrap();
        p.text = "new".into();
        store.upsert("docs", std::slice::from_ref(&p)).await.unwrap();

        assert_eq!(store.point_count("docs").await.unwrap(), 1);
        let results = store.search("docs", &[1.0, 0.0], 1).await.unwrap();
        assert_eq!(results[0].chunk.text, "new");
    }
}
