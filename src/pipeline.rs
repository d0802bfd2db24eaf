//! Provisioning pipeline
//!
//! Parses the source location, acquires the toolchain and the project
//! source side by side (their cache areas are disjoint), then builds. The
//! first failure aborts the run.

use crate::build::{BuildCredentials, BuildOrchestrator, ServableDir};
use crate::cache::CacheRoot;
use crate::config::Config;
use crate::error::{NodeserveError, NodeserveResult};
use crate::fetch::Downloader;
use crate::reference::RepositoryReference;
use crate::source::SourceAcquirer;
use crate::toolchain::{HostPlatform, ToolchainAcquirer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Turns a configuration into a servable directory
pub struct Pipeline {
    cache: CacheRoot,
    downloader: Arc<dyn Downloader>,
    platform: HostPlatform,
    orchestrator: BuildOrchestrator,
}

impl Pipeline {
    /// Pipeline for the current host
    pub fn new(
        cache: CacheRoot,
        downloader: Arc<dyn Downloader>,
        credentials: BuildCredentials,
    ) -> Self {
        Self {
            cache,
            downloader,
            platform: HostPlatform::detect(),
            orchestrator: BuildOrchestrator::new(credentials),
        }
    }

    /// Fetch the toolchain for `platform` instead of the host
    pub fn with_platform(mut self, platform: HostPlatform) -> Self {
        self.platform = platform;
        self
    }

    /// Cache the pipeline writes into
    pub fn cache(&self) -> &CacheRoot {
        &self.cache
    }

    /// Run every stage once
    pub async fn provision(
        &self,
        cancel: &CancellationToken,
        config: &Config,
    ) -> NodeserveResult<ServableDir> {
        if cancel.is_cancelled() {
            return Err(NodeserveError::Cancelled);
        }
        let reference = RepositoryReference::parse(&config.path)?;
        info!(
            "Provisioning {} into {}",
            reference,
            self.cache.path().display()
        );

        let downloader = self.downloader.as_ref();
        let toolchain =
            ToolchainAcquirer::for_platform(&self.cache, downloader, self.platform.clone());
        let source = SourceAcquirer::new(&self.cache, downloader);

        let (toolchain, source_root) = tokio::try_join!(
            toolchain.acquire(cancel, config),
            source.acquire(cancel, config, &reference),
        )?;

        if cancel.is_cancelled() {
            return Err(NodeserveError::Cancelled);
        }
        self.orchestrator
            .build(cancel, config, &toolchain, &source_root)
            .await
    }
}
