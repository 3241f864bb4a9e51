//! The conversion engine seam.
//!
//! The pipeline only knows the [`Converter`] trait: give it a local path,
//! get Markdown back or an error message. [`DocumentConverter`] is the
//! bundled implementation built on [`crate::extract`]; tests and embedders
//! can plug in their own.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::extract::{detect_format, extract_markdown};

/// Turns a local file into Markdown.
///
/// Implementations must not delete or move `path`; the caller owns it.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use fetch2md::converter::Converter;
/// use std::path::Path;
///
/// struct Uppercase;
///
/// #[async_trait]
/// impl Converter for Uppercase {
///     async fn convert(&self, path: &Path) -> anyhow::Result<String> {
///         Ok(tokio::fs::read_to_string(path).await?.to_uppercase())
///     }
/// }
/// ```
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, path: &Path) -> anyhow::Result<String>;
}

/// Extension-driven converter for PDF, OOXML, HTML and text formats.
///
/// Reading and parsing happen on tokio's blocking pool so a large PDF never
/// stalls the request-serving threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentConverter;

impl DocumentConverter {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous conversion of the file at `path`.
    pub fn convert_blocking(path: &Path) -> anyhow::Result<String> {
        let bytes = std::fs::read(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let format = detect_format(extension, &bytes)?;
        debug!(tmp = %path.display(), ?format, bytes = bytes.len(), "extracting");
        Ok(extract_markdown(&bytes, format)?)
    }
}

#[async_trait]
impl Converter for DocumentConverter {
    async fn convert(&self, path: &Path) -> anyhow::Result<String> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::convert_blocking(&path)).await?
    }
}
