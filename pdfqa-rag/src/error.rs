//! Error types for the `pdfqa-rag` crate.

use thiserror::Error;

use crate::document::DistanceMetric;

/// Errors that can occur while ingesting documents or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// A file could not be read as a PDF. Aborts the whole ingestion batch.
    #[error("Extraction failed for '{filename}': {message}")]
    ExtractionFailed {
        /// The uploaded file that failed.
        filename: String,
        /// A description of the failure.
        message: String,
    },

    /// The OCR engine could not recognize an image.
    #[error("OCR error ({engine}): {message}")]
    OcrFailed {
        /// The OCR engine that produced the error.
        engine: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingFailed {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector does not have the dimensionality of its collection.
    #[error(
        "Embedding dimension mismatch for collection '{collection}': expected {expected}, got {actual}"
    )]
    EmbeddingDimensionMismatch {
        /// The collection being written or created.
        collection: String,
        /// The dimension the collection was created with.
        expected: usize,
        /// The dimension that was offered.
        actual: usize,
    },

    /// A collection exists with a different distance metric than requested.
    #[error(
        "Distance metric mismatch for collection '{collection}': expected {expected}, got {actual}"
    )]
    DistanceMetricMismatch {
        /// The collection being created.
        collection: String,
        /// The metric the collection was created with.
        expected: DistanceMetric,
        /// The metric that was requested.
        actual: DistanceMetric,
    },

    /// The named collection does not exist, i.e. nothing was ingested into it.
    #[error("Collection '{0}' not found: no documents indexed")]
    CollectionNotFound(String),

    /// Another creator created the collection first.
    #[error("Collection '{0}' already exists")]
    CollectionCreateConflict(String),

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreFailed {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The text-generation call failed (timeout, quota, malformed response).
    #[error("Generation error ({provider}): {message}")]
    GenerationFailed {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
