//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use pdfqa_rag::{RagConfig, Result as RagResult};

/// Native vector size of the default embedding model.
pub const NATIVE_EMBEDDING_DIMENSIONS: usize = 768;

/// Where indexed chunks are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VectorBackend {
    /// A Qdrant server reached over gRPC.
    Qdrant,
    /// Process memory; lost on restart.
    Memory,
}

/// Server settings. Every flag can also be set through the environment
/// (or a `.env` file).
#[derive(Debug, Clone, Parser)]
#[command(name = "pdfqa-server", version, about = "Upload PDFs and ask questions about them")]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind_addr: SocketAddr,

    /// Collection used when a request does not name one.
    #[arg(long, env = "DEFAULT_COLLECTION", default_value = "default")]
    pub default_collection: String,

    /// Google Generative Language API key.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: String,

    #[arg(long, env = "EMBEDDING_MODEL", default_value = "text-embedding-004")]
    pub embedding_model: String,

    /// Embedding vector size. Values other than the model's native size are
    /// sent to the API as `outputDimensionality`.
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value_t = NATIVE_EMBEDDING_DIMENSIONS)]
    pub embedding_dimensions: usize,

    #[arg(long, env = "GENERATION_MODEL", default_value = "gemini-2.5-flash")]
    pub generation_model: String,

    #[arg(long, env = "GENERATION_TEMPERATURE", default_value_t = 0.3)]
    pub generation_temperature: f32,

    /// Per-request timeout for model calls, in seconds.
    #[arg(long, env = "MODEL_TIMEOUT_SECS", default_value_t = 60)]
    pub model_timeout_secs: u64,

    #[arg(long, env = "VECTOR_BACKEND", value_enum, default_value = "qdrant")]
    pub vector_backend: VectorBackend,

    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6334")]
    pub qdrant_url: String,

    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true)]
    pub qdrant_api_key: Option<String>,

    /// The `tesseract` executable used for OCR.
    #[arg(long, env = "TESSERACT_BIN", default_value = "tesseract")]
    pub tesseract_bin: PathBuf,

    #[arg(long, env = "OCR_LANGUAGE", default_value = "eng")]
    pub ocr_language: String,

    /// Skip OCR of embedded images.
    #[arg(long, env = "DISABLE_OCR")]
    pub disable_ocr: bool,

    #[arg(long, env = "CHUNK_SIZE", default_value_t = 1000)]
    pub chunk_size: usize,

    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = 100)]
    pub chunk_overlap: usize,

    #[arg(long, env = "TOP_K", default_value_t = 4)]
    pub top_k: usize,

    /// Largest accepted request body, in bytes.
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 50 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl ServerConfig {
    /// The pipeline settings carried by these flags, validated.
    pub fn rag_config(&self) -> RagResult<RagConfig> {
        RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .top_k(self.top_k)
            .build()
    }

    /// The `outputDimensionality` to request, when the configured size is not native.
    pub fn output_dimensionality(&self) -> Option<usize> {
        (self.embedding_dimensions != NATIVE_EMBEDDING_DIMENSIONS).then_some(self.embedding_dimensions)
    }
}
