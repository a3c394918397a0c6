//! Binary attachment to text conversion.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Converts a downloaded attachment into plain text. Behind a trait so the
/// ingestion pipeline can be exercised without a real PDF toolchain.
#[async_trait]
pub trait TextConverter: Send + Sync {
    async fn convert_to_text(&self, path: &Path) -> Result<String>;
}

/// PDF text extraction via pdf-extract, run on the blocking pool since
/// parsing is CPU-bound.
pub struct PdfConverter;

#[async_trait]
impl TextConverter for PdfConverter {
    async fn convert_to_text(&self, path: &Path) -> Result<String> {
        debug!(path = %path.display(), "extracting pdf text");

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read attachment file: {}", path.display()))?;

        let text = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string())
        })
        .await
        .context("PDF extraction task panicked")?
        .map_err(|e| anyhow!("PDF text extraction failed: {e}"))?;

        Ok(text)
    }
}
