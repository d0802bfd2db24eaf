//! Static server instance
//!
//! An instance validates its configuration, provisions the build output
//! through the [`Pipeline`], and serves it until closed. Construction either
//! yields a serving instance or fails as a whole.

pub mod files;

pub use files::FileServer;

use crate::build::ServableDir;
use crate::config::Config;
use crate::error::{NodeserveError, NodeserveResult};
use crate::pipeline::Pipeline;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// A provisioned, serving instance
#[derive(Debug)]
pub struct StaticServer {
    name: String,
    output: ServableDir,
    files: FileServer,
    cancel: CancellationToken,
}

impl StaticServer {
    /// Validate, provision and start serving.
    ///
    /// The instance name comes from the pipeline's cache identity.
    pub async fn new(config: Config, pipeline: &Pipeline) -> NodeserveResult<Self> {
        Self::with_cancellation(config, pipeline, CancellationToken::new()).await
    }

    /// Like [`StaticServer::new`], with a caller-supplied token so that
    /// provisioning can be interrupted before the instance exists
    pub async fn with_cancellation(
        config: Config,
        pipeline: &Pipeline,
        cancel: CancellationToken,
    ) -> NodeserveResult<Self> {
        let name = pipeline.cache().identity().name().to_string();
        config.validate(&name)?;

        let output = pipeline.provision(&cancel, &config).await?;
        let files = FileServer::start(output.root(), config.port(), cancel.clone()).await?;

        info!("Instance {} ready", name);
        Ok(Self {
            name,
            output,
            files,
            cancel,
        })
    }

    /// Instance name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory being served
    pub fn output(&self) -> &ServableDir {
        &self.output
    }

    /// Address of the file server
    pub fn local_addr(&self) -> SocketAddr {
        self.files.local_addr()
    }

    /// Generic command entry point; this component accepts none
    pub fn do_command(&self, _command: &serde_json::Value) -> NodeserveResult<serde_json::Value> {
        Err(NodeserveError::NotImplemented)
    }

    /// Cancel the instance's token, stopping the file server
    pub fn close(&self) {
        info!("Closing instance {}", self.name);
        self.cancel.cancel();
    }

    /// Wait until the file server has stopped
    pub async fn wait(self) -> NodeserveResult<()> {
        self.files.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildCredentials;
    use crate::cache::{CacheRoot, InstanceIdentity};
    use crate::fetch::testing::RoutingDownloader;
    use crate::toolchain::HostPlatform;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn pipeline(temp: &TempDir, downloader: Arc<RoutingDownloader>) -> Pipeline {
        let cache = CacheRoot::new(temp.path(), InstanceIdentity::new("site").unwrap());
        Pipeline::new(cache, downloader, BuildCredentials::default())
            .with_platform(HostPlatform::new("darwin", "arm64"))
    }

    #[tokio::test]
    async fn invalid_config_fails_before_provisioning() {
        let temp = TempDir::new().unwrap();
        let downloader = Arc::new(RoutingDownloader::with_scripts("", ""));
        let pipeline = pipeline(&temp, downloader.clone());

        let err = StaticServer::new(Config::new("  "), &pipeline)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeserveError::PathRequired));

        let err = StaticServer::new(Config::new("https://github.com/acme/widgets"), &pipeline)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeserveError::UnsupportedScheme));

        assert_eq!(downloader.node.call_count(), 0);
        assert_eq!(downloader.source.call_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_construction() {
        let temp = TempDir::new().unwrap();
        let downloader = Arc::new(RoutingDownloader::with_scripts("", ""));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = StaticServer::with_cancellation(
            Config::new("git+https://github.com/acme/widgets"),
            &pipeline(&temp, downloader),
            cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, NodeserveError::Cancelled));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn serves_build_output_until_closed() {
        let temp = TempDir::new().unwrap();
        let downloader = Arc::new(RoutingDownloader::with_scripts(
            "#!/bin/sh\ntrue\n",
            "#!/bin/sh\nmkdir -p dist && cp index.html dist/\n",
        ));
        let config = Config {
            port: Some(0),
            ..Config::new("git+https://github.com/acme/widgets")
        };

        let server = StaticServer::new(config, &pipeline(&temp, downloader))
            .await
            .unwrap();
        assert_eq!(server.name(), "site");
        assert!(server.output().root().ends_with("acme-widgets-1a2b3c4/dist"));

        let url = format!("http://127.0.0.1:{}/", server.local_addr().port());
        let body = tokio::task::spawn_blocking(move || {
            ureq::get(&url).call().unwrap().body_mut().read_to_string().unwrap()
        })
        .await
        .unwrap();
        assert_eq!(body, "<h1>widgets</h1>");

        assert!(matches!(
            server.do_command(&serde_json::json!({"command": "rebuild"})),
            Err(NodeserveError::NotImplemented)
        ));

        server.close();
        server.wait().await.unwrap();
    }
}
