//! Property tests for in-memory vector store search ordering.

use pdfqa_rag::document::{Chunk, DistanceMetric, IndexedVector};
use pdfqa_rag::inmemory::InMemoryVectorStore;
use pdfqa_rag::vectorstore::VectorStore;
use pdfqa_rag::RagError;
use proptest::prelude::*;
use uuid::Uuid;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a point with a fresh id and a normalized embedding.
fn arb_point(dim: usize) -> impl Strategy<Value = IndexedVector> {
    ("[a-z ]{5,30}", "[a-z]{1,8}\\.pdf", arb_normalized_embedding(dim)).prop_map(
        |(text, filename, embedding)| {
            let chunk = Chunk { id: Uuid::new_v4(), text, source_filename: filename };
            IndexedVector::new(&chunk, embedding)
        },
    )
}

fn metric() -> impl Strategy<Value = DistanceMetric> {
    prop_oneof![
        Just(DistanceMetric::Cosine),
        Just(DistanceMetric::Dot),
        Just(DistanceMetric::Euclid),
    ]
}

/// For any stored points, search returns at most `top_k` results ordered by
/// descending score, and every result carries the text and file name of the
/// point it was stored with.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            points in proptest::collection::vec(arb_point(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
            metric in metric(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", DIM, metric).await.unwrap();
                store.upsert("test", &points).await.unwrap();
                store.search("test", &query, top_k).await.unwrap()
            });

            prop_assert_eq!(results.len(), top_k.min(points.len()));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }

            for result in &results {
                let stored = points.iter().find(|p| p.chunk_id == result.chunk.id).unwrap();
                prop_assert_eq!(&stored.text, &result.chunk.text);
                prop_assert_eq!(&stored.metadata.source_filename, &result.chunk.source_filename);
            }
        }
    }
}

/// A collection keeps the dimension it was created with.
mod prop_dimension_stability {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn writes_with_another_dimension_are_rejected(
            created in 1usize..32,
            offered in 1usize..32,
        ) {
            prop_assume!(created != offered);

            let rt = tokio::runtime::Runtime::new().unwrap();
            let (err, count) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", created, DistanceMetric::Cosine).await.unwrap();
                let chunk = Chunk { id: Uuid::new_v4(), text: "t".into(), source_filename: "a.pdf".into() };
                let err = store.upsert("test", &[IndexedVector::new(&chunk, vec![1.0; offered])]).await.unwrap_err();
                (err, store.point_count("test").await.unwrap())
            });

            let is_mismatch = matches!(
                err,
                RagError::EmbeddingDimensionMismatch { expected, actual, .. }
                    if expected == created && actual == offered
            );
            prop_assert!(is_mismatch);
            prop_assert_eq!(count, 0);
        }
    }
}

#[tokio::test]
async fn search_of_missing_collection_is_not_found() {
    let store = InMemoryVectorStore::new();
    let err = store.search("never-ingested", &[1.0, 0.0], 4).await.unwrap_err();
    assert!(matches!(err, RagError::CollectionNotFound(name) if name == "never-ingested"));
}

#[tokio::test]
async fn delete_removes_collection() {
    let store = InMemoryVectorStore::new();
    store.create_collection("docs", 2, DistanceMetric::Cosine).await.unwrap();
    store.delete_collection("docs").await.unwrap();

    assert!(store.list_collections().await.unwrap().is_empty());
    assert!(matches!(
        store.describe_collection("docs").await,
        Err(RagError::CollectionNotFound(_))
    ));
}
