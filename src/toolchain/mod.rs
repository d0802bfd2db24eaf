//! Node.js toolchain acquisition
//!
//! Resolves the pinned Node release for this host, reuses an extracted copy
//! from the cache when one exists, and otherwise downloads it from
//! nodejs.org into a freshly purged cache area.

pub mod platform;

pub use platform::{HostPlatform, NodeDistribution, ToolchainLayout};

use crate::cache::{self, CacheArea, CacheRoot};
use crate::config::Config;
use crate::error::{NodeserveError, NodeserveResult};
use crate::fetch::{extract_archive, DownloadRequest, Downloader};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// An extracted Node.js toolchain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    root: PathBuf,
    layout: ToolchainLayout,
}

impl Toolchain {
    /// Toolchain rooted at `root`
    pub fn new(root: impl Into<PathBuf>, layout: ToolchainLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    /// Root of the extracted tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the executables
    pub fn bin_dir(&self) -> PathBuf {
        self.layout.bin_dir(&self.root)
    }

    /// The package manager
    pub fn npm(&self) -> PathBuf {
        self.layout.executable(&self.root, "npm")
    }

    /// The package runner
    pub fn npx(&self) -> PathBuf {
        self.layout.executable(&self.root, "npx")
    }
}

/// Fetches and caches the Node.js toolchain
pub struct ToolchainAcquirer<'a> {
    cache: &'a CacheRoot,
    downloader: &'a dyn Downloader,
    platform: HostPlatform,
}

impl<'a> ToolchainAcquirer<'a> {
    /// Acquirer for the current host
    pub fn new(cache: &'a CacheRoot, downloader: &'a dyn Downloader) -> Self {
        Self::for_platform(cache, downloader, HostPlatform::detect())
    }

    /// Acquirer for an explicit platform
    pub fn for_platform(
        cache: &'a CacheRoot,
        downloader: &'a dyn Downloader,
        platform: HostPlatform,
    ) -> Self {
        Self {
            cache,
            downloader,
            platform,
        }
    }

    /// Return the cached toolchain, downloading it first on a miss
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
        config: &Config,
    ) -> NodeserveResult<Toolchain> {
        let dist = NodeDistribution::resolve(&config.node_version(), &self.platform);
        debug!("Resolving Node {} for {}", dist.base_name(), self.platform);

        if let Some(root) = self.cached(&dist).await {
            debug!("\tNode already downloaded at {}", root.display());
            return Ok(Toolchain::new(root, dist.layout()));
        }

        if cancel.is_cancelled() {
            return Err(NodeserveError::Cancelled);
        }

        let dir = match self.cache.resolve_area(CacheArea::Toolchain).await {
            Ok(dir) => {
                cache::purge_dir(&dir).await?;
                dir
            }
            Err(e) => {
                let fallback = std::env::temp_dir();
                warn!(
                    "Cache unusable ({}), downloading Node into {}",
                    e,
                    fallback.display()
                );
                fallback
            }
        };

        info!("Downloading Node from {}", dist.url());
        let archive = self
            .downloader
            .download(&DownloadRequest::new(dist.url()), &dir, cancel)
            .await?;

        let dest = dir.clone();
        tokio::task::spawn_blocking(move || extract_archive(&archive, &dest))
            .await
            .map_err(|e| NodeserveError::Internal(format!("extraction task failed: {}", e)))??;

        let root = dir.join(dist.base_name());
        info!("Node ready at {}", root.display());
        Ok(Toolchain::new(root, dist.layout()))
    }

    async fn cached(&self, dist: &NodeDistribution) -> Option<PathBuf> {
        let dir = self.cache.resolve_area(CacheArea::Toolchain).await.ok()?;
        let root = dir.join(dist.base_name());
        tokio::fs::try_exists(&root)
            .await
            .ok()
            .filter(|exists| *exists)
            .map(|_| root)
    }
}
