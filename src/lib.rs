//! # fetch2md
//!
//! An HTTP service that downloads a document by URL and returns it as
//! Markdown.
//!
//! ## Architecture
//!
//! ```text
//! POST /convert {url}
//!        │
//!        ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  URL + ext   │──▶│  Downloader  │──▶│  Converter   │──▶ {mime_type, markdown}
//! │  validation  │   │ (temp file)  │   │ (blocking)   │
//! └──────────────┘   └──────┬───────┘   └──────┬───────┘
//!                           └── TempArtifact dropped on every exit ──┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! fetch2md serve                           # listen on 127.0.0.1:8000
//! curl -X POST localhost:8000/convert \
//!      -H 'content-type: application/json' \
//!      -d '{"url": "https://example.com/report.pdf"}'
//! fetch2md convert https://example.com/report.docx
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`error`] | Error taxonomy and HTTP status mapping |
//! | [`models`] | Request/response types |
//! | [`artifact`] | Per-request temporary files with guaranteed cleanup |
//! | [`download`] | Streaming downloader with size and status guards |
//! | [`extract`] | Per-format Markdown extraction |
//! | [`converter`] | Converter trait and the bundled implementation |
//! | [`pipeline`] | The download → convert → cleanup request handler |
//! | [`server`] | Axum HTTP server |

pub mod artifact;
pub mod config;
pub mod converter;
pub mod download;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod server;

pub use error::ConvertError;
pub use models::ConversionResult;
pub use pipeline::ConversionService;
