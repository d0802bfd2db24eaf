//! Source snapshot acquisition
//!
//! Downloads the GitHub zipball for a repository reference and unpacks it
//! into the instance's `source/` cache area. Refs can move, so the area is
//! purged and refetched on every acquisition.

use crate::cache::{self, CacheArea, CacheRoot};
use crate::config::Config;
use crate::error::{NodeserveError, NodeserveResult};
use crate::fetch::{extract_archive, DownloadRequest, Downloader};
use crate::reference::RepositoryReference;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Fetches project sources
pub struct SourceAcquirer<'a> {
    cache: &'a CacheRoot,
    downloader: &'a dyn Downloader,
}

impl<'a> SourceAcquirer<'a> {
    /// Acquirer writing into `cache`
    pub fn new(cache: &'a CacheRoot, downloader: &'a dyn Downloader) -> Self {
        Self { cache, downloader }
    }

    /// Download and extract `reference`, returning the project root
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
        config: &Config,
        reference: &RepositoryReference,
    ) -> NodeserveResult<PathBuf> {
        let url = reference.snapshot_url();
        let dir = self.cache.resolve_area(CacheArea::Source).await?;
        cache::purge_dir(&dir).await?;

        if cancel.is_cancelled() {
            return Err(NodeserveError::Cancelled);
        }

        let request = DownloadRequest::new(url).with_bearer_token(config.access_token());
        info!("Downloading {} to {}", reference, dir.display());
        let archive = self.downloader.download(&request, &dir, cancel).await?;

        let roots = {
            let archive = archive.clone();
            let dest = dir.clone();
            tokio::task::spawn_blocking(move || extract_archive(&archive, &dest))
                .await
                .map_err(|e| {
                    NodeserveError::Internal(format!("extraction task failed: {}", e))
                })??
        };

        let root = source_root(&dir, &archive, &roots)?;
        debug!("Project root is {}", root.display());
        Ok(root)
    }
}

/// Directory the snapshot unpacked into.
///
/// GitHub names the zipball after its root directory, so the archive's
/// file stem is tried first; a lone top-level directory is the fallback.
fn source_root(dir: &Path, archive: &Path, roots: &BTreeSet<String>) -> NodeserveResult<PathBuf> {
    if let Some(stem) = archive.file_stem() {
        let candidate = dir.join(stem);
        if candidate.is_dir() {
            return Ok(candidate);
        }
    }

    let mut dirs = roots.iter().map(|r| dir.join(r)).filter(|p| p.is_dir());
    match (dirs.next(), dirs.next()) {
        (Some(only), None) => Ok(only),
        _ => Err(NodeserveError::ArchiveRootMissing(archive.to_path_buf())),
    }
}
