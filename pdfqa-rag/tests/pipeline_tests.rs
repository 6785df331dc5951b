//! End-to-end ingestion and answering over the in-memory store.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use common::{LETTER_DIMENSIONS, LetterEmbedder, PixelOcr, RecordingGenerator, scanned_pdf, text_pdf};
use pdfqa_rag::{
    DistanceMetric, Document, EmbeddingProvider, ExtractedBatch, InMemoryVectorStore,
    NOT_FOUND_SENTINEL, RagConfig, RagContext, RagError, Result, UploadedFile, VectorStore,
};

struct Harness {
    context: RagContext,
    store: Arc<InMemoryVectorStore>,
    generator: Arc<RecordingGenerator>,
}

fn harness(config: RagConfig) -> Harness {
    let store = Arc::new(InMemoryVectorStore::new());
    let generator = Arc::new(RecordingGenerator::new("Invoice 42 is due on Friday."));
    let context = RagContext::builder()
        .config(config)
        .embedding_provider(Arc::new(LetterEmbedder))
        .generation_provider(generator.clone())
        .vector_store(store.clone())
        .ocr_engine(Arc::new(PixelOcr))
        .build()
        .unwrap();
    Harness { context, store, generator }
}

#[test]
fn builder_requires_providers() {
    let err = RagContext::builder().vector_store(Arc::new(InMemoryVectorStore::new())).build();
    assert!(matches!(err, Err(RagError::ConfigError(_))));
}

#[test]
fn builder_rejects_inconsistent_config() {
    let config = RagConfig { chunk_size: 1000, chunk_overlap: 1000, ..RagConfig::default() };
    let err = RagContext::builder()
        .config(config)
        .embedding_provider(Arc::new(LetterEmbedder))
        .generation_provider(Arc::new(RecordingGenerator::new("unused")))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .build();
    assert!(matches!(err, Err(RagError::ConfigError(message)) if message.contains("chunk_overlap")));
}

/// Letter embedder that remembers the largest batch it received.
struct LargestBatch(AtomicUsize);

#[async_trait]
impl EmbeddingProvider for LargestBatch {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        LetterEmbedder.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.0.fetch_max(texts.len(), Ordering::SeqCst);
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(LetterEmbedder.embed(text).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        LETTER_DIMENSIONS
    }
}

#[tokio::test]
async fn long_document_is_embedded_in_bounded_batches() {
    let embedder = Arc::new(LargestBatch(AtomicUsize::new(0)));
    let store = Arc::new(InMemoryVectorStore::new());
    let context = RagContext::builder()
        .embedding_provider(embedder.clone())
        .generation_provider(Arc::new(RecordingGenerator::new("unused")))
        .vector_store(store.clone())
        .build()
        .unwrap();
    let batch = ExtractedBatch::from_documents(vec![Document {
        filename: "long.pdf".into(),
        raw_text: "lorem ipsum dolor sit amet ".repeat(6000),
    }]);

    let chunks = context.chunk(&batch);
    assert!(chunks.len() > 150);
    let written = context.index("docs", &chunks).await.unwrap();

    assert_eq!(written, chunks.len());
    assert_eq!(store.point_count("docs").await.unwrap(), chunks.len());
    assert!(embedder.0.load(Ordering::SeqCst) <= 100);
}

#[test]
fn chunk_step_splits_fifteen_hundred_chars() {
    let h = harness(RagConfig::default());
    let batch = ExtractedBatch::from_documents(vec![Document {
        filename: "a.pdf".into(),
        raw_text: "A".repeat(1500),
    }]);

    let chunks = h.context.chunk(&batch);

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].text, "A".repeat(1000));
    assert_eq!(chunks[1].text, "A".repeat(600));
}

#[tokio::test]
async fn ingest_then_ask_uses_retrieved_context() {
    let h = harness(RagConfig::builder().chunk_size(40).chunk_overlap(5).build().unwrap());
    let files = [
        UploadedFile::new("notes.pdf", text_pdf(&["Zebras graze quietly"])),
        UploadedFile::new("scan.pdf", scanned_pdf("INVOICE 42")),
    ];

    let report = h.context.ingest(&files, "default").await.unwrap();
    assert_eq!(report.documents, 2);
    assert!(report.chunks >= 2);
    assert_eq!(h.store.point_count("default").await.unwrap(), report.chunks);

    let answer = h.context.ask("Which invoice?", "default").await.unwrap();
    assert_eq!(answer, "Invoice 42 is due on Friday.");

    let prompt = h.generator.last_prompt().unwrap();
    assert!(prompt.contains("INVOICE 42"));
    assert!(prompt.contains("Which invoice?"));
    assert!(prompt.contains(NOT_FOUND_SENTINEL));
}

#[tokio::test]
async fn ask_before_any_ingestion_is_not_found() {
    let h = harness(RagConfig::default());

    let err = h.context.ask("anything?", "never-ingested").await.unwrap_err();

    assert!(err.to_string().contains("no documents indexed"));
    assert!(matches!(err, RagError::CollectionNotFound(name) if name == "never-ingested"));
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn reingesting_appends_without_recreating_collection() {
    let h = harness(RagConfig::default());
    let files = [UploadedFile::new("a.pdf", text_pdf(&["Hello World!"]))];

    let first = h.context.ingest(&files, "docs").await.unwrap();
    let second = h.context.ingest(&files, "docs").await.unwrap();

    assert_eq!(h.store.list_collections().await.unwrap(), vec!["docs".to_string()]);
    assert_eq!(h.store.point_count("docs").await.unwrap(), first.chunks + second.chunks);
    let info = h.store.describe_collection("docs").await.unwrap();
    assert_eq!(info.dimensions, LETTER_DIMENSIONS);
    assert_eq!(info.metric, DistanceMetric::Cosine);
}

#[tokio::test]
async fn existing_collection_with_other_dimension_is_rejected() {
    let h = harness(RagConfig::default());
    h.store.create_collection("docs", 768, DistanceMetric::Cosine).await.unwrap();

    let err = h
        .context
        .ingest(&[UploadedFile::new("a.pdf", text_pdf(&["Hello"]))], "docs")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RagError::EmbeddingDimensionMismatch { expected: 768, actual: LETTER_DIMENSIONS, .. }
    ));
    assert_eq!(h.store.point_count("docs").await.unwrap(), 0);
}

#[tokio::test]
async fn unreadable_upload_leaves_index_untouched() {
    let h = harness(RagConfig::default());
    let files = [
        UploadedFile::new("a.pdf", text_pdf(&["Hello"])),
        UploadedFile::new("b.pdf", b"garbage".to_vec()),
    ];

    let err = h.context.ingest(&files, "docs").await.unwrap_err();

    assert!(matches!(err, RagError::ExtractionFailed { .. }));
    assert!(h.store.list_collections().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_collection_answers_with_sentinel_without_generating() {
    let h = harness(RagConfig::default());
    let empty = [UploadedFile::new("blank.pdf", text_pdf(&[]))];

    let report = h.context.ingest(&empty, "docs").await.unwrap();
    assert_eq!(report.chunks, 0);

    let answer = h.context.ask("What is inside?", "docs").await.unwrap();
    assert_eq!(answer, NOT_FOUND_SENTINEL);
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn retrieve_returns_at_most_top_k() {
    let h = harness(RagConfig::builder().chunk_size(10).chunk_overlap(0).top_k(3).build().unwrap());
    h.context
        .ingest(
            &[UploadedFile::new("long.pdf", text_pdf(&["abcdefghijklmnopqrstuvwxyz abcdefghij"]))],
            "docs",
        )
        .await
        .unwrap();

    let context = h.context.retrieve("abc", "docs").await.unwrap();

    assert_eq!(context.len(), 3);
    for pair in context.results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}
