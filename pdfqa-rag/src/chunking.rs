//! Fixed-size chunking with per-document attribution.
//!
//! [`FixedSizeChunker`] walks the aggregate text of an [`ExtractedBatch`] in
//! overlapping character windows. Windows are attributed to documents by
//! character offset: a window is cut at every document boundary it crosses,
//! so each resulting [`Chunk`] lies entirely inside one document.

use std::ops::Range;

use tracing::debug;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::document::{Chunk, ExtractedBatch};

/// Splits text into fixed-size character windows with configurable overlap.
///
/// The split is purely textual and ignores sentence and word boundaries.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(1000, 100);
/// let chunks = chunker.chunk(&batch);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: number of characters per window
    /// * `chunk_overlap`: number of characters shared by consecutive windows
    ///
    /// Use [`RagConfig::builder`] to validate the pair; an overlap that is not
    /// smaller than the size degrades to a single window.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// Create a chunker from the window parameters of a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Character ranges of the windows over a text of `len` characters.
    ///
    /// Consecutive windows start `chunk_size - chunk_overlap` apart. The walk
    /// stops at the first window that reaches the end of the text.
    pub fn windows(&self, len: usize) -> Vec<Range<usize>> {
        let mut windows = Vec::new();
        if len == 0 || self.chunk_size == 0 {
            return windows;
        }

        let step = self.chunk_size.saturating_sub(self.chunk_overlap);
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(len);
            windows.push(start..end);
            if end == len || step == 0 {
                break;
            }
            start += step;
        }
        windows
    }

    /// Split the batch's aggregate text and attribute every piece to its document.
    ///
    /// Returns one chunk per (window, document) intersection, in window order.
    pub fn chunk(&self, batch: &ExtractedBatch) -> Vec<Chunk> {
        let aggregate = batch.aggregate_text();
        let offsets = char_offsets(&aggregate);
        let char_len = offsets.len() - 1;

        let mut chunks = Vec::new();
        for window in self.windows(char_len) {
            for (document, span) in batch.documents().iter().zip(batch.spans()) {
                let start = window.start.max(span.start);
                let end = window.end.min(span.end);
                if start >= end {
                    continue;
                }
                chunks.push(Chunk {
                    id: Uuid::new_v4(),
                    text: aggregate[offsets[start]..offsets[end]].to_string(),
                    source_filename: document.filename.clone(),
                });
            }
        }

        debug!(
            documents = batch.documents().len(),
            chars = char_len,
            chunk_count = chunks.len(),
            "chunked batch"
        );
        chunks
    }
}

/// Byte offset of every character boundary, including the end of the string.
fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect()
}
