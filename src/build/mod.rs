//! Project build
//!
//! Runs the install and build scripts of an extracted project with the
//! acquired toolchain, then hands back the output directory.

pub mod convention;
pub mod process;

pub use convention::{BuildConvention, BuildCredentials};
pub use process::{run_step, StepCommand};

use crate::config::Config;
use crate::error::{NodeserveError, NodeserveResult};
use crate::toolchain::Toolchain;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Build output ready to be served
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServableDir {
    root: PathBuf,
}

impl ServableDir {
    /// Check that `root` is an existing directory
    pub async fn open(root: impl Into<PathBuf>) -> NodeserveResult<Self> {
        let root = root.into();
        match tokio::fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => Ok(Self { root }),
            Ok(_) => Err(NodeserveError::OutputNotDirectory(root)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(NodeserveError::OutputMissing(root))
            }
            Err(e) => Err(NodeserveError::io(format!("reading {}", root.display()), e)),
        }
    }

    /// Directory to serve
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Runs `npm install` and the project's build script
#[derive(Debug, Clone, Default)]
pub struct BuildOrchestrator {
    credentials: BuildCredentials,
}

impl BuildOrchestrator {
    /// Orchestrator forwarding `credentials` into the build
    pub fn new(credentials: BuildCredentials) -> Self {
        Self { credentials }
    }

    /// Build the project at `source_root`
    pub async fn build(
        &self,
        cancel: &CancellationToken,
        config: &Config,
        toolchain: &Toolchain,
        source_root: &Path,
    ) -> NodeserveResult<ServableDir> {
        let output_dir = source_root.join(config.build_directory_path()?);
        let npm = toolchain.npm();
        let bin_dir = toolchain.bin_dir();

        info!("Installing dependencies in {}", source_root.display());
        let install = StepCommand::new(&npm, source_root)
            .arg("install")
            .path_prefix(&bin_dir);
        run_step(&install, cancel).await?;

        let convention = BuildConvention::detect(source_root).await;
        debug!("Using the {} variable convention", convention);

        let script = config.build_script();
        info!("Running build script '{}'", script);
        let build = build_invocation(
            toolchain,
            source_root,
            &self.credentials.env_assignments(convention),
            script,
        );
        run_step(&build, cancel).await?;

        let output = ServableDir::open(output_dir).await?;
        info!("Build output at {}", output.root().display());
        Ok(output)
    }
}

/// `npx --yes cross-env <assignments...> <npm> run <script>`
fn build_invocation(
    toolchain: &Toolchain,
    source_root: &Path,
    assignments: &[String],
    script: &str,
) -> StepCommand {
    StepCommand::new(toolchain.npx(), source_root)
        .args(["--yes", "cross-env"])
        .args(assignments)
        .arg(toolchain.npm())
        .args(["run", script])
        .path_prefix(toolchain.bin_dir())
}
