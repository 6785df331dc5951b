//! Optical character recognition of raster images.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// Recognizes text in an encoded image (PNG, JPEG, JPEG 2000).
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Return the text found in the image, or an empty string if there is none.
    async fn recognize(&self, image: &[u8]) -> Result<String>;
}

/// An [`OcrEngine`] that runs the `tesseract` command-line program.
///
/// The image is written to the child's stdin and the recognized text is read
/// from its stdout, so no temporary files are involved.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: PathBuf,
    language: String,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self { binary: PathBuf::from("tesseract"), language: "eng".to_string() }
    }
}

impl TesseractOcr {
    /// Use `tesseract` from `PATH` with the English model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `tesseract` executable.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the language model(s), e.g. `"eng"` or `"eng+deu"`.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn failure(message: impl Into<String>) -> RagError {
        RagError::OcrFailed { engine: "tesseract".into(), message: message.into() }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String> {
        debug!(engine = "tesseract", image_len = image.len(), "running ocr");

        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!(engine = "tesseract", binary = %self.binary.display(), error = %e, "spawn failed");
                Self::failure(format!("failed to start {}: {e}", self.binary.display()))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(image)
                .await
                .map_err(|e| Self::failure(format!("failed to write image: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Self::failure(format!("failed to read output: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(engine = "tesseract", status = %output.status, "ocr failed");
            return Err(Self::failure(format!("{}: {}", output.status, stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_an_ocr_error() {
        let ocr = TesseractOcr::new().with_binary("/nonexistent/tesseract-for-tests");
        let err = ocr.recognize(b"not an image").await.unwrap_err();
        assert!(matches!(err, RagError::OcrFailed { .. }));
    }
}
