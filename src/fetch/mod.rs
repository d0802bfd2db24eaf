//! Archive downloads
//!
//! Both acquirers fetch a single archive over HTTPS into a cache area and
//! then unpack it. The transfer sits behind the [`Downloader`] trait so the
//! acquisition logic can be exercised without a network.

pub mod extract;
#[cfg(test)]
pub(crate) mod testing;

pub use extract::{extract_archive, ArchiveFormat};

use crate::error::{NodeserveError, NodeserveResult};
use async_trait::async_trait;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How often transfer progress is logged
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

const CHUNK_SIZE: usize = 64 * 1024;

/// A single archive to fetch
#[derive(Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Absolute HTTPS URL
    pub url: String,
    /// Sent as `Authorization: Bearer <token>` when present
    pub bearer_token: Option<String>,
}

impl DownloadRequest {
    /// Anonymous request for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer_token: None,
        }
    }

    /// Attach a bearer token
    pub fn with_bearer_token(mut self, token: Option<&str>) -> Self {
        self.bearer_token = token.map(str::to_string);
        self
    }
}

impl std::fmt::Debug for DownloadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("url", &self.url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Fetches an archive into a directory
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `request` into `dest_dir`, returning the written file.
    ///
    /// The file name comes from the server (`Content-Disposition`) when it
    /// names one, otherwise from the last URL path segment.
    async fn download(
        &self,
        request: &DownloadRequest,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> NodeserveResult<PathBuf>;
}

/// Bytes moved so far, shared between the transfer and the progress logger
#[derive(Debug, Default)]
pub struct TransferProgress {
    complete: AtomicU64,
    total: AtomicU64,
}

impl TransferProgress {
    /// Bytes received so far
    pub fn complete(&self) -> u64 {
        self.complete.load(Ordering::Relaxed)
    }

    /// Expected size, if the server announced one
    pub fn total(&self) -> Option<u64> {
        match self.total.load(Ordering::Relaxed) {
            0 => None,
            n => Some(n),
        }
    }

    /// Fraction complete in percent, 0 when the size is unknown
    pub fn percent(&self) -> f64 {
        match self.total() {
            Some(total) => 100.0 * self.complete() as f64 / total as f64,
            None => 0.0,
        }
    }

    fn set_total(&self, total: Option<u64>) {
        self.total.store(total.unwrap_or(0), Ordering::Relaxed);
    }

    fn add(&self, bytes: u64) {
        self.complete.fetch_add(bytes, Ordering::Relaxed);
    }

    fn log(&self) {
        let total = self
            .total()
            .map_or_else(|| "?".to_string(), |t| t.to_string());
        debug!(
            "\tDownloaded {}/{} bytes ({:.2}%)",
            self.complete(),
            total,
            self.percent()
        );
    }
}

/// Downloader backed by a blocking `ureq` agent on the blocking pool
#[derive(Clone)]
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    /// Create a downloader with default agent settings
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(
        &self,
        request: &DownloadRequest,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> NodeserveResult<PathBuf> {
        if cancel.is_cancelled() {
            return Err(NodeserveError::Cancelled);
        }

        let progress = Arc::new(TransferProgress::default());
        let abort = Arc::new(AtomicBool::new(false));
        let _abort_on_drop = AbortOnDrop(Arc::clone(&abort));

        let mut transfer = tokio::task::spawn_blocking({
            let agent = self.agent.clone();
            let request = request.clone();
            let dest_dir = dest_dir.to_path_buf();
            let progress = Arc::clone(&progress);
            let abort = Arc::clone(&abort);
            move || fetch_blocking(&agent, &request, &dest_dir, &progress, &abort)
        });

        let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => progress.log(),
                // The guard stops the blocking side at its next chunk
                () = cancel.cancelled() => return Err(NodeserveError::Cancelled),
                joined = &mut transfer => {
                    let path = joined.map_err(|e| {
                        NodeserveError::Internal(format!("download task failed: {}", e))
                    })??;
                    progress.log();
                    return Ok(path);
                }
            }
        }
    }
}

/// Flags the blocking transfer to stop once the download future is gone,
/// whether it returned, was cancelled or was dropped mid-flight.
struct AbortOnDrop(Arc<AtomicBool>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

fn fetch_blocking(
    agent: &ureq::Agent,
    request: &DownloadRequest,
    dest_dir: &Path,
    progress: &TransferProgress,
    abort: &AtomicBool,
) -> NodeserveResult<PathBuf> {
    let url = request.url.as_str();
    let mut builder = agent.get(url);
    if let Some(token) = &request.bearer_token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let response = builder
        .call()
        .map_err(|e| NodeserveError::download(url, e))?;

    let disposition = response
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let file_name = disposition
        .as_deref()
        .and_then(filename_from_disposition)
        .or_else(|| filename_from_url(url))
        .ok_or_else(|| NodeserveError::download(url, "cannot determine a file name"))?;

    let body = response.into_body();
    progress.set_total(body.content_length());
    let mut reader = body.into_reader();

    let final_path = dest_dir.join(&file_name);
    let part_path = dest_dir.join(format!("{}.part", file_name));
    debug!("Downloading {} to {}", url, final_path.display());

    let written = copy_with_progress(&mut reader, &part_path, progress, abort);
    if let Err(e) = written {
        let _ = std::fs::remove_file(&part_path);
        return Err(match e {
            CopyError::Aborted => NodeserveError::Cancelled,
            CopyError::Read(e) => NodeserveError::download(url, e),
            CopyError::Write(e) => {
                NodeserveError::io(format!("writing {}", part_path.display()), e)
            }
        });
    }

    std::fs::rename(&part_path, &final_path)
        .map_err(|e| NodeserveError::io(format!("renaming {}", part_path.display()), e))?;
    Ok(final_path)
}

enum CopyError {
    Aborted,
    Read(std::io::Error),
    Write(std::io::Error),
}

fn copy_with_progress(
    reader: &mut impl Read,
    path: &Path,
    progress: &TransferProgress,
    abort: &AtomicBool,
) -> Result<(), CopyError> {
    let mut file = std::fs::File::create(path).map_err(CopyError::Write)?;
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        if abort.load(Ordering::Relaxed) {
            return Err(CopyError::Aborted);
        }
        let n = reader.read(&mut buf).map_err(CopyError::Read)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(CopyError::Write)?;
        progress.add(n as u64);
    }

    file.flush().map_err(CopyError::Write)
}

/// File name from a `Content-Disposition` header value
pub fn filename_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"'))
        .and_then(sanitize_file_name)
}

/// Last path segment of a URL, ignoring query and fragment
pub fn filename_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    let (_, path) = path.split_once('/')?;
    path.rsplit('/').next().and_then(sanitize_file_name)
}

fn sanitize_file_name(name: &str) -> Option<String> {
    let name = Path::new(name).file_name()?.to_str()?;
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}
