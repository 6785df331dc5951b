//! # pdfqa-rag
//!
//! PDF ingestion and retrieval-augmented question answering.
//!
//! ## Overview
//!
//! Uploaded PDFs flow through five stages:
//!
//! - [`PdfExtractor`] reads each page's text layer and runs OCR on embedded images
//! - [`FixedSizeChunker`] cuts the text into overlapping windows, attributed to their file
//! - [`VectorIndexManager`] embeds the chunks and writes them to a [`VectorStore`] collection
//! - [`Retriever`] finds the chunks most similar to a question
//! - [`AnswerSynthesizer`] asks a [`GenerationProvider`] to answer from those chunks only
//!
//! [`RagContext`] wires the stages together around shared providers.
//!
//! ## Features
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `gemini` | [`gemini::GeminiEmbeddingProvider`], [`gemini::GeminiGenerationProvider`] |
//! | `qdrant` | [`qdrant::QdrantVectorStore`] |
//! | `full` | everything |

pub mod answer;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod inmemory;
pub mod ocr;
pub mod pipeline;
pub mod retriever;
pub mod vectorstore;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use answer::{AnswerSynthesizer, NOT_FOUND_SENTINEL};
pub use chunking::FixedSizeChunker;
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    Chunk, ChunkMetadata, CollectionInfo, DistanceMetric, Document, ExtractedBatch, IndexedVector,
    RetrievedContext, SearchResult, UploadedFile,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use extract::PdfExtractor;
pub use generation::GenerationProvider;
pub use index::{MAX_EMBED_BATCH, VectorIndexManager};
pub use inmemory::InMemoryVectorStore;
pub use ocr::{OcrEngine, TesseractOcr};
pub use pipeline::{IngestReport, RagContext, RagContextBuilder};
pub use retriever::Retriever;
pub use vectorstore::VectorStore;
