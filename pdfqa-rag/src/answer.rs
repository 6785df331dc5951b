//! Grounded answer synthesis.

use std::sync::Arc;

use tracing::{debug, info};

use crate::document::RetrievedContext;
use crate::error::Result;
use crate::generation::GenerationProvider;

/// The exact reply the model is told to give when the context lacks the answer.
pub const NOT_FOUND_SENTINEL: &str = "answer is not available in the context";

/// Composes a grounding prompt from retrieved chunks and asks a
/// [`GenerationProvider`] to answer from them alone.
pub struct AnswerSynthesizer {
    generator: Arc<dyn GenerationProvider>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn GenerationProvider>) -> Self {
        Self { generator }
    }

    /// Build the prompt sent to the model.
    ///
    /// Every retrieved chunk is included, in rank order, separated by blank lines.
    pub fn build_prompt(question: &str, context: &RetrievedContext) -> String {
        let context_text = context.chunks().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n\n");
        format!(
            "Answer the question as detailed as possible using only the provided context, and \
             include every relevant detail from it. If the answer is not in the provided context, \
             reply exactly \"{NOT_FOUND_SENTINEL}\" and nothing else. Do not use outside knowledge \
             and do not make up an answer.\n\n\
             Context:\n{context_text}\n\n\
             Question:\n{question}\n\n\
             Answer:\n"
        )
    }

    /// Answer `question` from `context`.
    ///
    /// Returns the model output unmodified. With an empty context the sentinel
    /// is returned without calling the model.
    ///
    /// # Errors
    ///
    /// Propagates [`RagError::GenerationFailed`](crate::RagError::GenerationFailed)
    /// from the provider.
    pub async fn answer(&self, question: &str, context: &RetrievedContext) -> Result<String> {
        if context.is_empty() {
            info!("no context retrieved, returning sentinel");
            return Ok(NOT_FOUND_SENTINEL.to_string());
        }

        let prompt = Self::build_prompt(question, context);
        debug!(context_chunks = context.len(), prompt_len = prompt.len(), "generating answer");
        let answer = self.generator.generate(&prompt).await?;
        info!(answer_len = answer.len(), "answer generated");
        Ok(answer)
    }
}
