//! Pipeline context and orchestration.
//!
//! A [`RagContext`] is built once at startup and shared by reference. It holds
//! the providers every stage needs and exposes each stage as an independently
//! awaitable step, plus the composed [`ingest`](RagContext::ingest) and
//! [`ask`](RagContext::ask) calls used by the transport layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfqa_rag::{RagConfig, RagContext, InMemoryVectorStore, TesseractOcr};
//!
//! let context = RagContext::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .generation_provider(Arc::new(my_generator))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .ocr_engine(Arc::new(TesseractOcr::new()))
//!     .build()?;
//!
//! context.ingest(&files, "default").await?;
//! let answer = context.ask("What is the invoice number?", "default").await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::answer::AnswerSynthesizer;
use crate::chunking::FixedSizeChunker;
use crate::config::RagConfig;
use crate::document::{Chunk, ExtractedBatch, RetrievedContext, UploadedFile};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::PdfExtractor;
use crate::generation::GenerationProvider;
use crate::index::VectorIndexManager;
use crate::ocr::OcrEngine;
use crate::retriever::Retriever;
use crate::vectorstore::VectorStore;

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestReport {
    /// Number of files extracted.
    pub documents: usize,
    /// Number of chunks embedded and written.
    pub chunks: usize,
}

/// Shared providers and configuration for every pipeline stage.
///
/// Construct one via [`RagContext::builder()`].
pub struct RagContext {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    extractor: PdfExtractor,
    chunker: FixedSizeChunker,
    index: VectorIndexManager,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
}

impl RagContext {
    /// Create a new [`RagContextBuilder`].
    pub fn builder() -> RagContextBuilder {
        RagContextBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Extract the text of every file, in upload order.
    pub async fn extract(&self, files: &[UploadedFile]) -> Result<ExtractedBatch> {
        self.extractor.extract(files).await
    }

    /// Split an extracted batch into attributed chunks.
    pub fn chunk(&self, batch: &ExtractedBatch) -> Vec<Chunk> {
        self.chunker.chunk(batch)
    }

    /// Ensure `collection` exists for the configured embedder, then embed and write `chunks`.
    ///
    /// Returns the number of points written.
    pub async fn index(&self, collection: &str, chunks: &[Chunk]) -> Result<usize> {
        self.index
            .ensure_collection(
                collection,
                self.embedding_provider.dimensions(),
                self.config.distance_metric,
            )
            .await?;
        self.index.upsert(collection, chunks).await
    }

    /// Retrieve the configured number of chunks for `question`.
    pub async fn retrieve(&self, question: &str, collection: &str) -> Result<RetrievedContext> {
        self.retriever.retrieve(question, collection).await
    }

    /// Answer `question` from an already retrieved context.
    pub async fn answer(&self, question: &str, context: &RetrievedContext) -> Result<String> {
        self.synthesizer.answer(question, context).await
    }

    /// Extract, chunk and index `files` into `collection`.
    ///
    /// Extraction completes for the whole batch before anything is written, so
    /// an unreadable file leaves the index untouched.
    ///
    /// # Errors
    ///
    /// Returns the first [`RagError`] raised by any stage.
    pub async fn ingest(&self, files: &[UploadedFile], collection: &str) -> Result<IngestReport> {
        let batch = self.extract(files).await.map_err(|e| {
            error!(collection, file_count = files.len(), error = %e, "extraction failed");
            e
        })?;
        let chunks = self.chunk(&batch);
        let written = self.index(collection, &chunks).await?;

        let report = IngestReport { documents: batch.documents().len(), chunks: written };
        info!(collection, documents = report.documents, chunks = report.chunks, "ingestion completed");
        Ok(report)
    }

    /// Retrieve context for `question` from `collection` and answer from it.
    ///
    /// # Errors
    ///
    /// - [`RagError::CollectionNotFound`] if nothing was ingested into `collection`
    /// - [`RagError::EmbeddingFailed`] or [`RagError::GenerationFailed`] from the providers
    pub async fn ask(&self, question: &str, collection: &str) -> Result<String> {
        let context = self.retrieve(question, collection).await?;
        let answer = self.answer(question, &context).await?;
        info!(collection, context_chunks = context.len(), "question answered");
        Ok(answer)
    }
}

/// Builder for constructing a [`RagContext`].
///
/// The embedding provider, generation provider and vector store are required.
/// Without an OCR engine, embedded images are not read.
#[derive(Default)]
pub struct RagContextBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    ocr_engine: Option<Arc<dyn OcrEngine>>,
}

impl RagContextBuilder {
    /// Set the pipeline configuration. Defaults to [`RagConfig::default()`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider shared by indexing and retrieval.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the text-generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the OCR engine used for embedded images.
    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr_engine = Some(engine);
        self
    }

    /// Build the [`RagContext`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the config is inconsistent, a
    /// required provider is missing, or the embedder reports zero dimensions.
    pub fn build(self) -> Result<RagContext> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::ConfigError("generation_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;

        if embedding_provider.dimensions() == 0 {
            return Err(RagError::ConfigError(
                "embedding provider reports zero dimensions".to_string(),
            ));
        }

        let extractor = match self.ocr_engine {
            Some(engine) => PdfExtractor::new(engine),
            None => PdfExtractor::text_only(),
        };

        Ok(RagContext {
            chunker: FixedSizeChunker::from_config(&config),
            index: VectorIndexManager::new(
                embedding_provider.clone(),
                vector_store.clone(),
                config.upsert_batch_size,
            ),
            retriever: Retriever::new(embedding_provider.clone(), vector_store.clone(), config.top_k),
            synthesizer: AnswerSynthesizer::new(generation_provider),
            extractor,
            config,
            embedding_provider,
            vector_store,
        })
    }
}
