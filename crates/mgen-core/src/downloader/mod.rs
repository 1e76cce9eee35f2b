//! Artifact downloader with integrity checks.
//!
//! Streams the remote body into `<dest>.part`, syncs, renames to `dest`, and
//! then requires that `dest` exists with a non-zero size. A zero-length or
//! missing file is a `DownloadError`, never a success. Progress callbacks get
//! cumulative byte counts and cannot influence the transfer.

mod curl_source;

pub use curl_source::CurlSource;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::storage::{self, StorageWriter};

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("transfer failed: {0}")]
    Transfer(String),
    #[error("HTTP {0}")]
    Http(u32),
    #[error("storage: {0}")]
    Storage(String),
    #[error("downloaded file is empty: {}", .0.display())]
    Empty(PathBuf),
    #[error("downloaded file is missing: {}", .0.display())]
    Missing(PathBuf),
}

/// Sink that receives body chunks in order.
pub type ChunkSink<'a> = dyn FnMut(&[u8]) -> Result<(), DownloadError> + 'a;

/// Source of artifact bytes (HTTP in production).
pub trait ArtifactSource: Send + Sync {
    /// Stream the body at `url` into `sink`. Returns total bytes delivered.
    fn fetch(&self, url: &str, sink: &mut ChunkSink<'_>) -> Result<u64, DownloadError>;
}

/// Downloads artifacts to deterministic local paths.
#[derive(Clone)]
pub struct Downloader {
    source: Arc<dyn ArtifactSource>,
}

impl Downloader {
    pub fn new(source: Arc<dyn ArtifactSource>) -> Self {
        Self { source }
    }

    /// Download `url` to `dest`, reporting cumulative bytes to `progress`.
    /// Returns the final local path.
    ///
    /// Blocking; call from `spawn_blocking` in async code.
    pub fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut dyn FnMut(u64),
    ) -> Result<PathBuf, DownloadError> {
        let temp = storage::temp_path(dest);
        let writer =
            StorageWriter::create(&temp).map_err(|e| DownloadError::Storage(format!("{:#}", e)))?;

        let mut offset = 0u64;
        let fetched = {
            let w = writer.clone();
            let mut sink = |chunk: &[u8]| -> Result<(), DownloadError> {
                w.write_at(offset, chunk)
                    .map_err(|e| DownloadError::Storage(format!("{:#}", e)))?;
                offset += chunk.len() as u64;
                progress(offset);
                Ok(())
            };
            self.source.fetch(url, &mut sink)
        };
        if let Err(e) = fetched {
            writer.discard();
            return Err(e);
        }

        if let Err(e) = writer.sync() {
            writer.discard();
            return Err(DownloadError::Storage(format!("{:#}", e)));
        }
        writer
            .finalize(dest)
            .map_err(|e| DownloadError::Storage(format!("{:#}", e)))?;

        verify_non_empty(dest)?;
        tracing::info!(path = %dest.display(), bytes = offset, "artifact downloaded");
        Ok(dest.to_path_buf())
    }
}

/// The destination must exist and be non-empty. An empty file is removed so it
/// is never mistaken for a finished artifact later.
fn verify_non_empty(dest: &Path) -> Result<(), DownloadError> {
    match std::fs::metadata(dest) {
        Ok(m) if m.is_file() && m.len() > 0 => Ok(()),
        Ok(m) if m.is_file() => {
            let _ = std::fs::remove_file(dest);
            Err(DownloadError::Empty(dest.to_path_buf()))
        }
        _ => Err(DownloadError::Missing(dest.to_path_buf())),
    }
}
