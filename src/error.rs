//! Error types for the conversion pipeline.
//!
//! Every failure a request can hit is one variant of [`ConvertError`]. The
//! pipeline returns these as plain values; only the HTTP boundary
//! ([`crate::server`]) turns them into a status code and a `detail` string.
//!
//! | Class | Variants | Status |
//! |-------|----------|--------|
//! | client input | `InvalidRequest`, `InvalidUrl`, `UnsupportedExtension`, `UpstreamStatus` | 400 |
//! | resource limit | `PayloadTooLarge` | 413 |
//! | upstream connectivity | `UpstreamUnreachable` | 502 |
//! | internal | `Conversion`, `Internal` | 500 |

use thiserror::Error;

/// All classified failures of a single conversion request.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Client input ──────────────────────────────────────────────────────
    /// The request body could not be decoded.
    #[error("invalid request body: {0}")]
    InvalidRequest(String),

    /// The `url` field is not an absolute http(s) URL.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The file extension derived from the URL path is not allowed.
    #[error("unsupported file extension: .{extension}")]
    UnsupportedExtension { extension: String },

    /// The upstream answered with something other than 200.
    #[error("download failed: status {status}")]
    UpstreamStatus { status: u16 },

    // ── Resource limits ───────────────────────────────────────────────────
    /// Declared or received payload size is above the configured bound.
    #[error("file too large: exceeds limit of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    // ── Upstream connectivity ─────────────────────────────────────────────
    /// DNS failure, refused connection, timeout or a broken body stream.
    #[error("download failed: connection error")]
    UpstreamUnreachable { reason: String },

    // ── Internal ──────────────────────────────────────────────────────────
    /// The converter rejected the downloaded file.
    #[error("{0}")]
    Conversion(String),

    /// Anything unexpected: temp file I/O, a crashed worker, etc.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// HTTP status code for this error class.
    pub fn status_code(&self) -> u16 {
        match self {
            ConvertError::InvalidRequest(_)
            | ConvertError::InvalidUrl { .. }
            | ConvertError::UnsupportedExtension { .. }
            | ConvertError::UpstreamStatus { .. } => 400,
            ConvertError::PayloadTooLarge { .. } => 413,
            ConvertError::UpstreamUnreachable { .. } => 502,
            ConvertError::Conversion(_) | ConvertError::Internal(_) => 500,
        }
    }

    /// Message shown to the caller.
    ///
    /// `Internal` errors are reported generically; their cause is only logged.
    pub fn detail(&self) -> String {
        match self {
            ConvertError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }

    /// Short machine-readable name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::InvalidRequest(_) => "invalid_request",
            ConvertError::InvalidUrl { .. } => "invalid_url",
            ConvertError::UnsupportedExtension { .. } => "unsupported_extension",
            ConvertError::UpstreamStatus { .. } => "upstream_status",
            ConvertError::PayloadTooLarge { .. } => "payload_too_large",
            ConvertError::UpstreamUnreachable { .. } => "upstream_unreachable",
            ConvertError::Conversion(_) => "conversion",
            ConvertError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_detail_embeds_code() {
        let e = ConvertError::UpstreamStatus { status: 404 };
        assert_eq!(e.status_code(), 400);
        assert!(e.detail().contains("404"), "got: {}", e.detail());
    }

    #[test]
    fn status_codes_per_class() {
        assert_eq!(ConvertError::InvalidRequest("x".into()).status_code(), 400);
        assert_eq!(
            ConvertError::UnsupportedExtension {
                extension: "exe".into()
            }
            .status_code(),
            400
        );
        assert_eq!(ConvertError::PayloadTooLarge { limit: 1 }.status_code(), 413);
        assert_eq!(
            ConvertError::UpstreamUnreachable {
                reason: "refused".into()
            }
            .status_code(),
            502
        );
        assert_eq!(ConvertError::Conversion("bad".into()).status_code(), 500);
    }

    #[test]
    fn internal_detail_is_generic() {
        let e = ConvertError::Internal("disk full at /tmp/x".into());
        assert_eq!(e.detail(), "internal error");
        assert!(e.to_string().contains("disk full"));
    }

    #[test]
    fn conversion_detail_surfaces_message() {
        let e = ConvertError::Conversion("PDF extraction failed: bad xref".into());
        assert_eq!(e.detail(), "PDF extraction failed: bad xref");
    }

    #[test]
    fn unreachable_detail_hides_reason() {
        let e = ConvertError::UpstreamUnreachable {
            reason: "dns error: no such host".into(),
        };
        assert_eq!(e.detail(), "download failed: connection error");
    }
}
