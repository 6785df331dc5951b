//! Gemini embedding and generation providers over the REST API.
//!
//! This module is only available when the `gemini` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::index::MAX_EMBED_BATCH;

/// The default Generative Language API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// The default dimensionality for `text-embedding-004`.
const DEFAULT_DIMENSIONS: usize = 768;

/// The default generation model.
const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-flash";

/// The default sampling temperature for grounded answers.
const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Shared HTTP plumbing for both providers.
#[derive(Clone)]
struct GeminiHttp {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiHttp {
    fn new(api_key: String, model: &str) -> std::result::Result<Self, String> {
        if api_key.is_empty() {
            return Err("API key must not be empty".into());
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            model: model.into(),
        })
    }

    fn with_timeout(mut self, timeout: Duration) -> std::result::Result<Self, String> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(self)
    }

    fn model_path(&self) -> String {
        if self.model.starts_with("models/") { self.model.clone() } else { format!("models/{}", self.model) }
    }

    /// POST `body` to `{base}/{model}:{method}` and decode the JSON reply.
    async fn post<Req: Serialize, Res: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &Req,
    ) -> std::result::Result<Res, String> {
        let url = format!("{}/{}:{method}", self.base_url.trim_end_matches('/'), self.model_path());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(format!("API returned {status}: {detail}"));
        }

        response.json().await.map_err(|e| format!("failed to parse response: {e}"))
    }
}

// ── Gemini API request/response types ─────────────────────────────

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> std::result::Result<String, String> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(format!("empty response: {reason}"));
        };

        let finish = candidate.finish_reason.unwrap_or_default();
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        if parts.iter().all(|p| p.text.is_none()) {
            return Err(format!("candidate has no text (finish reason: {finish})"));
        }
        Ok(parts.into_iter().filter_map(|p| p.text).collect())
    }
}

// ── Embedding provider ─────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by the Gemini `embedContent` API.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::gemini::GeminiEmbeddingProvider;
///
/// let provider = GeminiEmbeddingProvider::new("your-api-key")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct GeminiEmbeddingProvider {
    http: GeminiHttp,
    dimensions: usize,
    output_dimensionality: Option<usize>,
}

impl GeminiEmbeddingProvider {
    /// Create a provider for `text-embedding-004`.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = GeminiHttp::new(api_key.into(), DEFAULT_EMBEDDING_MODEL).map_err(Self::failure)?;
        Ok(Self { http, dimensions: DEFAULT_DIMENSIONS, output_dimensionality: None })
    }

    /// Create a provider using the `GOOGLE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| Self::failure("GOOGLE_API_KEY environment variable not set"))?;
        Self::new(api_key)
    }

    /// Use another embedding model with its native dimensionality.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.http.model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Ask the API to truncate vectors to `dims` elements.
    pub fn with_output_dimensionality(mut self, dims: usize) -> Self {
        self.output_dimensionality = Some(dims);
        self.dimensions = dims;
        self
    }

    /// The truncation requested from the API, if any.
    pub fn output_dimensionality(&self) -> Option<usize> {
        self.output_dimensionality
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.http.base_url = base_url.into();
        self
    }

    /// Set a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = self.http.with_timeout(timeout).map_err(Self::failure)?;
        Ok(self)
    }

    fn failure(message: impl Into<String>) -> RagError {
        RagError::EmbeddingFailed { provider: "Gemini".into(), message: message.into() }
    }

    fn request<'a>(&self, text: &'a str) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: self.http.model_path(),
            content: Content { role: None, parts: vec![Part { text }] },
            output_dimensionality: self.output_dimensionality,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "Gemini", text_len = text.len(), "embedding single text");

        let response: EmbedContentResponse =
            self.http.post("embedContent", &self.request(text)).await.map_err(|e| {
                error!(provider = "Gemini", error = %e, "embedding request failed");
                Self::failure(e)
            })?;

        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for group in texts.chunks(MAX_EMBED_BATCH) {
            debug!(provider = "Gemini", batch_size = group.len(), "embedding batch");

            let body =
                BatchEmbedContentsRequest { requests: group.iter().map(|t| self.request(t)).collect() };
            let response: BatchEmbedContentsResponse =
                self.http.post("batchEmbedContents", &body).await.map_err(|e| {
                    error!(provider = "Gemini", error = %e, "batch embedding request failed");
                    Self::failure(e)
                })?;

            if response.embeddings.len() != group.len() {
                return Err(Self::failure(format!(
                    "expected {} embeddings, got {}",
                    group.len(),
                    response.embeddings.len()
                )));
            }
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Generation provider ────────────────────────────────────────────

/// A [`GenerationProvider`] backed by the Gemini `generateContent` API.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::gemini::GeminiGenerationProvider;
///
/// let provider = GeminiGenerationProvider::new("your-api-key")?.with_temperature(0.2);
/// let text = provider.generate("Say hi").await?;
/// ```
pub struct GeminiGenerationProvider {
    http: GeminiHttp,
    temperature: f32,
    max_output_tokens: Option<u32>,
}

impl GeminiGenerationProvider {
    /// Create a provider for `gemini-2.5-flash` at temperature 0.3.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http =
            GeminiHttp::new(api_key.into(), DEFAULT_GENERATION_MODEL).map_err(Self::failure)?;
        Ok(Self { http, temperature: DEFAULT_TEMPERATURE, max_output_tokens: None })
    }

    /// Create a provider using the `GOOGLE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| Self::failure("GOOGLE_API_KEY environment variable not set"))?;
        Self::new(api_key)
    }

    /// Set the model name (e.g. `gemini-2.5-pro`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.http.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap the length of generated answers.
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.http.base_url = base_url.into();
        self
    }

    /// Set a per-request timeout; an expired request is a generation failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = self.http.with_timeout(timeout).map_err(Self::failure)?;
        Ok(self)
    }

    fn failure(message: impl Into<String>) -> RagError {
        RagError::GenerationFailed { provider: "Gemini".into(), message: message.into() }
    }
}

#[async_trait]
impl GenerationProvider for GeminiGenerationProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(provider = "Gemini", model = %self.http.model, prompt_len = prompt.len(), "generating");

        let body = GenerateContentRequest {
            contents: vec![Content { role: Some("user"), parts: vec![Part { text: prompt }] }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let response: GenerateContentResponse =
            self.http.post("generateContent", &body).await.map_err(|e| {
                error!(provider = "Gemini", error = %e, "generation request failed");
                Self::failure(e)
            })?;

        response.into_text().map_err(|e| {
            error!(provider = "Gemini", error = %e, "malformed generation response");
            Self::failure(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(
            GeminiGenerationProvider::new(""),
            Err(RagError::GenerationFailed { .. })
        ));
        assert!(matches!(GeminiEmbeddingProvider::new(""), Err(RagError::EmbeddingFailed { .. })));
    }

    #[test]
    fn model_path_is_prefixed_once() {
        let provider = GeminiEmbeddingProvider::new("key").unwrap();
        assert_eq!(provider.http.model_path(), "models/text-embedding-004");
        let provider = provider.with_model("models/custom", 256);
        assert_eq!(provider.http.model_path(), "models/custom");
        assert_eq!(provider.dimensions(), 256);
    }

    #[test]
    fn generation_request_serializes_camel_case() {
        let body = GenerateContentRequest {
            contents: vec![Content { role: Some("user"), parts: vec![Part { text: "hi" }] }],
            generation_config: GenerationConfig { temperature: 0.3, max_output_tokens: None },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert!((json["generationConfig"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert!(json["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn response_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_text().unwrap(), "Hello world");
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        let err = response.into_text().unwrap_err();
        assert!(err.contains("SAFETY"));
    }
}
