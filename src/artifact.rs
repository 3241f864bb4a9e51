//! Per-request temporary files.
//!
//! A [`TempArtifact`] owns one path under the configured temp directory,
//! named `<prefix><uuid>.<ext>`. The file is created lazily by the
//! downloader and removed when the guard is dropped, on every exit path:
//! normal return, early `?` return, panic unwinding, or cancellation of the
//! request future.

use reqwest::Url;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Extension used when the URL path has none.
pub const DEFAULT_EXTENSION: &str = "bin";

/// Upper bound on accepted extension length; longer suffixes fall back to
/// [`DEFAULT_EXTENSION`].
const MAX_EXTENSION_LEN: usize = 16;

/// Derives a lower-case file extension from the last segment of the URL path.
///
/// Only ASCII alphanumeric suffixes are kept, so the result is always safe
/// to splice into a file name.
pub fn extension_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| Path::new(last).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Scoped temporary file owned by exactly one in-flight request.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    extension: String,
    removed: bool,
}

impl TempArtifact {
    /// Reserves a unique path. Nothing is written to disk yet.
    pub fn allocate(dir: &Path, prefix: &str, extension: &str) -> Self {
        let name = format!("{}{}.{}", prefix, Uuid::new_v4(), extension);
        Self {
            path: dir.join(name),
            extension: extension.to_string(),
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Removes the file through tokio's fs pool. Used when the request
    /// finishes normally; `Drop` still covers panics and cancellation.
    pub async fn remove(mut self) {
        let result = tokio::fs::remove_file(&self.path).await;
        self.removed = log_removal(&self.path, result);
    }
}

/// Logs the outcome of an unlink. Returns whether the file is gone.
fn log_removal(path: &Path, result: std::io::Result<()>) -> bool {
    match result {
        Ok(()) => {
            debug!(tmp = %path.display(), "cleanup complete");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(tmp = %path.display(), error = %e, "cleanup failed");
            false
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        // Blocking unlink; only reached on unwind or when the request future is dropped.
        log_removal(&self.path, std::fs::remove_file(&self.path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ext(url: &str) -> String {
        extension_from_url(&Url::parse(url).unwrap())
    }

    #[test]
    fn extension_is_taken_from_last_segment() {
        assert_eq!(ext("https://example.com/docs/report.pdf"), "pdf");
        assert_eq!(ext("https://example.com/a.b/Slides.PPTX?x=1#top"), "pptx");
        assert_eq!(ext("https://example.com/archive.tar.gz"), "gz");
    }

    #[test]
    fn missing_extension_falls_back_to_bin() {
        assert_eq!(ext("https://example.com/"), "bin");
        assert_eq!(ext("https://example.com"), "bin");
        assert_eq!(ext("https://example.com/download"), "bin");
        assert_eq!(ext("https://example.com/folder.pdf/"), "bin");
        assert_eq!(ext("https://example.com/.hidden"), "bin");
    }

    #[test]
    fn unsafe_extensions_fall_back_to_bin() {
        assert_eq!(ext("https://example.com/x.p%2Fdf"), "bin");
        assert_eq!(ext("https://example.com/x.averyveryverylongsuffix"), "bin");
    }

    #[test]
    fn allocated_paths_are_unique_and_well_formed() {
        let dir = TempDir::new().unwrap();
        let a = TempArtifact::allocate(dir.path(), "fetch2md-", "pdf");
        let b = TempArtifact::allocate(dir.path(), "fetch2md-", "pdf");
        assert_ne!(a.path(), b.path());
        let name = a.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("fetch2md-"));
        assert!(name.ends_with(".pdf"));
        assert_eq!(a.path().parent().unwrap(), dir.path());
        assert_eq!(a.extension(), "pdf");
    }

    #[test]
    fn drop_removes_written_file() {
        let dir = TempDir::new().unwrap();
        let artifact = TempArtifact::allocate(dir.path(), "t-", "txt");
        std::fs::write(artifact.path(), b"hello").unwrap();
        let path = artifact.path().to_path_buf();
        assert!(path.exists());
        drop(artifact);
        assert!(!path.exists());
    }

    #[test]
    fn drop_without_file_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let artifact = TempArtifact::allocate(dir.path(), "t-", "txt");
        drop(artifact);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn remove_deletes_file_and_skips_drop() {
        let dir = TempDir::new().unwrap();
        let artifact = TempArtifact::allocate(dir.path(), "t-", "txt");
        std::fs::write(artifact.path(), b"done").unwrap();
        let path = artifact.path().to_path_buf();
        artifact.remove().await;
        assert!(!path.exists());

        let never_written = TempArtifact::allocate(dir.path(), "t-", "txt");
        never_written.remove().await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn drop_runs_during_panic_unwind() {
        let dir = TempDir::new().unwrap();
        let dir_path = dir.path().to_path_buf();
        let result = std::panic::catch_unwind(move || {
            let artifact = TempArtifact::allocate(&dir_path, "t-", "txt");
            std::fs::write(artifact.path(), b"partial").unwrap();
            panic!("converter blew up");
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
