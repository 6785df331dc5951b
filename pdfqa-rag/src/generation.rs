//! Text-generation provider trait.

use async_trait::async_trait;

use crate::error::Result;

/// A language model that completes a prompt.
///
/// Implementations are configured once with their sampling settings (a low,
/// near-deterministic temperature for grounded answering) and report any
/// failure as [`RagError::GenerationFailed`](crate::RagError::GenerationFailed).
/// Retrying is left to the caller.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a completion for `prompt` and return its text.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
