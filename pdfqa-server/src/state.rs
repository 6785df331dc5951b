//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pdfqa_rag::gemini::{GeminiEmbeddingProvider, GeminiGenerationProvider};
use pdfqa_rag::qdrant::QdrantVectorStore;
use pdfqa_rag::{InMemoryVectorStore, RagContext, TesseractOcr, VectorStore};
use tracing::info;

use crate::config::{ServerConfig, VectorBackend};

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<RagContext>,
    pub default_collection: String,
}

impl AppState {
    pub fn new(context: Arc<RagContext>, default_collection: impl Into<String>) -> Self {
        Self { context, default_collection: default_collection.into() }
    }

    /// Wire the Gemini providers, the configured vector store and OCR into a context.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.model_timeout_secs);

        let embedder = embedding_provider(config, timeout)?;
        let generator = GeminiGenerationProvider::new(config.google_api_key.clone())?
            .with_model(config.generation_model.clone())
            .with_temperature(config.generation_temperature)
            .with_timeout(timeout)?;

        let store: Arc<dyn VectorStore> = match config.vector_backend {
            VectorBackend::Qdrant => Arc::new(
                QdrantVectorStore::new(&config.qdrant_url, config.qdrant_api_key.clone())
                    .with_context(|| format!("cannot connect to qdrant at {}", config.qdrant_url))?,
            ),
            VectorBackend::Memory => Arc::new(InMemoryVectorStore::new()),
        };

        let mut builder = RagContext::builder()
            .config(config.rag_config()?)
            .embedding_provider(Arc::new(embedder))
            .generation_provider(Arc::new(generator))
            .vector_store(store);
        if !config.disable_ocr {
            builder = builder.ocr_engine(Arc::new(
                TesseractOcr::new()
                    .with_binary(config.tesseract_bin.clone())
                    .with_language(config.ocr_language.clone()),
            ));
        }

        info!(
            backend = ?config.vector_backend,
            embedding_model = %config.embedding_model,
            generation_model = %config.generation_model,
            ocr = !config.disable_ocr,
            "pipeline configured"
        );
        Ok(Self::new(Arc::new(builder.build()?), config.default_collection.clone()))
    }
}

fn embedding_provider(config: &ServerConfig, timeout: Duration) -> anyhow::Result<GeminiEmbeddingProvider> {
    let mut embedder = GeminiEmbeddingProvider::new(config.google_api_key.clone())?
        .with_model(config.embedding_model.clone(), config.embedding_dimensions);
    if let Some(dims) = config.output_dimensionality() {
        embedder = embedder.with_output_dimensionality(dims);
    }
    Ok(embedder.with_timeout(timeout)?)
}
