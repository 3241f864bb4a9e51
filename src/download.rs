//! Streaming downloader with status and size guards.
//!
//! The response body is pulled chunk by chunk and written through a
//! `BufWriter` sized to `download.chunk_size_bytes`, so at most one network
//! chunk plus one write buffer is held in memory. The running total is
//! checked after every chunk, which catches bodies with a missing or
//! understated `Content-Length`.

use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect, Client, StatusCode, Url};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::DownloadConfig;
use crate::error::ConvertError;

/// Fallback media type when neither the header nor the extension helps.
pub const OCTET_STREAM: &str = "application/octet-stream";

const MAX_REDIRECTS: usize = 10;

/// Outcome of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub mime_type: String,
    pub bytes: u64,
}

/// HTTP downloader. Holds one `reqwest::Client` (and its connection pool)
/// for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    max_bytes: u64,
    chunk_size: usize,
}

impl Downloader {
    pub fn new(config: &DownloadConfig) -> Result<Self, ConvertError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(concat!("fetch2md/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConvertError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    /// Uses a caller-supplied client; its timeout and redirect policy apply.
    pub fn with_client(client: Client, config: &DownloadConfig) -> Self {
        Self {
            client,
            max_bytes: config.max_file_size_bytes,
            chunk_size: config.chunk_size_bytes,
        }
    }

    /// Downloads `url` into `dest`.
    ///
    /// `dest` is only created once the status and declared length have been
    /// accepted. On a mid-stream failure a partial file may remain; removing
    /// it is the caller's job.
    pub async fn download_to(&self, url: &Url, dest: &Path) -> Result<Downloaded, ConvertError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| unreachable_error(url, e))?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            debug!(%url, status, "unexpected upstream status");
            return Err(ConvertError::UpstreamStatus { status });
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                debug!(%url, declared, limit = self.max_bytes, "declared size over limit");
                return Err(ConvertError::PayloadTooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let header_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let file = tokio::fs::File::create(dest).await?;
        let mut writer = tokio::io::BufWriter::with_capacity(self.chunk_size, file);
        let mut total: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| unreachable_error(url, e))?
        {
            total += chunk.len() as u64;
            if total > self.max_bytes {
                debug!(%url, received = total, limit = self.max_bytes, "payload over limit, aborting");
                return Err(ConvertError::PayloadTooLarge {
                    limit: self.max_bytes,
                });
            }
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;

        let mime_type = resolve_mime_type(header_type.as_deref(), dest);
        info!(%url, status = 200, bytes = total, %mime_type, "download complete");

        Ok(Downloaded {
            mime_type,
            bytes: total,
        })
    }
}

fn unreachable_error(url: &Url, err: reqwest::Error) -> ConvertError {
    debug!(%url, error = %err, timeout = err.is_timeout(), "download error");
    ConvertError::UpstreamUnreachable {
        reason: err.to_string(),
    }
}

/// Declared `Content-Type`, else a guess from the file extension, else
/// `application/octet-stream`.
pub fn resolve_mime_type(header: Option<&str>, path: &Path) -> String {
    header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .or_else(|| mime_guess::from_path(path).first_raw().map(str::to_string))
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}
