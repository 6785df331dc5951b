//! Data types for uploaded files, documents, chunks, and search results.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A raw upload: the client-supplied file name and the file's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// The file name as sent by the client.
    pub filename: String,
    /// The raw PDF bytes.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Create a new upload from a file name and its contents.
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { filename: filename.into(), bytes: bytes.into() }
    }
}

/// The text extracted from one uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// The originating file name.
    pub filename: String,
    /// Native text and OCR text, in page order.
    pub raw_text: String,
}

/// The documents of one ingestion call, in upload order.
///
/// The aggregate text is the concatenation of every document's text; each
/// document occupies a contiguous range of that text, measured in characters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedBatch {
    documents: Vec<Document>,
    spans: Vec<Range<usize>>,
}

impl ExtractedBatch {
    /// Build a batch from documents in upload order.
    pub fn from_documents(documents: Vec<Document>) -> Self {
        let mut spans = Vec::with_capacity(documents.len());
        let mut offset = 0;
        for document in &documents {
            let len = document.raw_text.chars().count();
            spans.push(offset..offset + len);
            offset += len;
        }
        Self { documents, spans }
    }

    /// The documents, in upload order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Character range of each document within [`aggregate_text`](Self::aggregate_text).
    pub fn spans(&self) -> &[Range<usize>] {
        &self.spans
    }

    /// All document texts concatenated in upload order.
    pub fn aggregate_text(&self) -> String {
        self.documents.iter().map(|d| d.raw_text.as_str()).collect()
    }

    /// Total length of the aggregate text in characters.
    pub fn char_len(&self) -> usize {
        self.spans.last().map_or(0, |s| s.end)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// A segment of a [`Document`]'s text, ready to be embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Unique identifier, generated when the chunk is created.
    pub id: Uuid,
    /// Non-empty substring of the source document's text.
    pub text: String,
    /// The file name of the document the text was taken from.
    pub source_filename: String,
}

/// Payload stored with every indexed vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub source_filename: String,
    pub chunk_id: Uuid,
}

/// A chunk's embedding together with the data needed to return it from a search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedVector {
    /// Point identifier in the collection; equal to the chunk id.
    pub chunk_id: Uuid,
    /// The embedding of `text`.
    pub vector: Vec<f32>,
    /// The chunk text.
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl IndexedVector {
    /// Pair a chunk with its embedding.
    pub fn new(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            chunk_id: chunk.id,
            vector,
            text: chunk.text.clone(),
            metadata: ChunkMetadata {
                source_filename: chunk.source_filename.clone(),
                chunk_id: chunk.id,
            },
        }
    }

    /// Rebuild the chunk this vector was created from.
    pub fn to_chunk(&self) -> Chunk {
        Chunk {
            id: self.chunk_id,
            text: self.text.clone(),
            source_filename: self.metadata.source_filename.clone(),
        }
    }
}

/// Similarity function a collection is searched with.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Dot => write!(f, "dot"),
            DistanceMetric::Euclid => write!(f, "euclid"),
        }
    }
}

/// Name and vector parameters of an existing collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub dimensions: usize,
    pub metric: DistanceMetric,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// Search results for one question, most similar first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub results: Vec<SearchResult>,
}

impl RetrievedContext {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self { results }
    }

    /// The retrieved chunks in rank order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.results.iter().map(|r| &r.chunk)
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}
