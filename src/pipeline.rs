//! The conversion request handler.
//!
//! ```text
//! url ─▶ parse ─▶ extension gate ─▶ allocate artifact ─▶ download ─▶ convert ─▶ result
//!                                          │                                   │
//!                                          └──────── dropped on every exit ────┘
//! ```
//!
//! Stages run strictly in order. Each returns `Result<_, ConvertError>` and
//! the first failure short-circuits with `?`. The file is removed
//! asynchronously once the pipeline returns; the [`TempArtifact`] guard's
//! `Drop` removes it if the future panics or is cancelled first.

use reqwest::Url;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::artifact::{extension_from_url, TempArtifact};
use crate::config::DownloadConfig;
use crate::converter::{Converter, DocumentConverter};
use crate::download::Downloader;
use crate::error::ConvertError;
use crate::models::ConversionResult;

/// Parses and validates a client-supplied URL. Only absolute `http` and
/// `https` URLs with a host are accepted.
pub fn parse_request_url(raw: &str) -> Result<Url, ConvertError> {
    let invalid = |reason: String| ConvertError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// Download-and-convert service shared by all requests.
///
/// Cheap to clone; the HTTP client and converter are shared.
#[derive(Clone)]
pub struct ConversionService {
    config: Arc<DownloadConfig>,
    downloader: Downloader,
    converter: Arc<dyn Converter>,
}

impl ConversionService {
    /// Service with the bundled [`DocumentConverter`].
    pub fn new(config: DownloadConfig) -> Result<Self, ConvertError> {
        let downloader = Downloader::new(&config)?;
        Ok(Self::with_parts(
            config,
            downloader,
            Arc::new(DocumentConverter::new()),
        ))
    }

    pub fn with_parts(
        config: DownloadConfig,
        downloader: Downloader,
        converter: Arc<dyn Converter>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            downloader,
            converter,
        }
    }

    /// Runs the whole pipeline for one URL.
    ///
    /// At most one temporary file is created, and it is gone when this
    /// future completes or is dropped.
    pub async fn convert_url(&self, raw_url: &str) -> Result<ConversionResult, ConvertError> {
        let url = parse_request_url(raw_url)?;

        let extension = extension_from_url(&url);
        if !self.config.is_extension_allowed(&extension) {
            warn!(%url, %extension, "rejected extension");
            return Err(ConvertError::UnsupportedExtension { extension });
        }

        let artifact = TempArtifact::allocate(
            &self.config.temp_dir,
            &self.config.temp_prefix,
            &extension,
        );

        let result = self.download_and_convert(&url, &artifact).await;
        if let Err(e) = &result {
            let tmp = artifact.path().display();
            match e {
                ConvertError::Conversion(_) | ConvertError::Internal(_) => {
                    error!(%url, %tmp, kind = e.kind(), error = %e, "convert failed")
                }
                _ => warn!(%url, %tmp, kind = e.kind(), error = %e, "request failed"),
            }
        }
        artifact.remove().await;
        result
    }

    async fn download_and_convert(
        &self,
        url: &Url,
        artifact: &TempArtifact,
    ) -> Result<ConversionResult, ConvertError> {
        let tmp = artifact.path().display();

        info!(%url, %tmp, extension = artifact.extension(), "download start");
        let downloaded = self.downloader.download_to(url, artifact.path()).await?;

        info!(%tmp, bytes = downloaded.bytes, "convert start");
        let markdown = self
            .converter
            .convert(artifact.path())
            .await
            .map_err(|e| ConvertError::Conversion(e.to_string()))?;
        info!(%tmp, chars = markdown.chars().count(), "convert complete");

        Ok(ConversionResult {
            mime_type: downloaded.mime_type,
            markdown,
        })
    }
}
