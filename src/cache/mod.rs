//! Per-instance download cache
//!
//! Every instance owns a directory under a base path (the system temp dir
//! by default), keyed by a stable identity:
//!
//! ```text
//! <base>/<namespace>/<family>/<model>/<instance name>/
//!     node/     extracted toolchain + its archive
//!     source/   extracted source snapshot + its archive
//! ```
//!
//! The contents are the only record of what has been acquired: an expected
//! artifact that exists is treated as complete. Each area is purged as a
//! unit before a fresh acquisition, so a directory is either entirely from
//! one acquisition or about to be replaced.

use crate::error::{NodeserveError, NodeserveResult};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Namespace of the server model
pub const NAMESPACE: &str = "viam";
/// Family of the server model
pub const FAMILY: &str = "static-server-node";
/// Name of the server model
pub const MODEL: &str = "server";

/// Identity an instance's cache is keyed by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceIdentity {
    namespace: String,
    family: String,
    model: String,
    name: String,
}

impl InstanceIdentity {
    /// Identity for an instance of the static server model
    pub fn new(name: impl Into<String>) -> NodeserveResult<Self> {
        let name = name.into();
        if !is_single_component(&name) {
            return Err(NodeserveError::InvalidInstanceName(name));
        }
        Ok(Self {
            namespace: NAMESPACE.to_string(),
            family: FAMILY.to_string(),
            model: MODEL.to_string(),
            name,
        })
    }

    /// Instance name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<namespace>/<family>/<model>/<name>`
    pub fn relative_path(&self) -> PathBuf {
        [&self.namespace, &self.family, &self.model, &self.name]
            .iter()
            .collect()
    }
}

impl fmt::Display for InstanceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}/{}",
            self.namespace, self.family, self.model, self.name
        )
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Sub-directory of the cache root owned by one acquirer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheArea {
    /// Node.js toolchain
    Toolchain,
    /// Source snapshot
    Source,
}

impl CacheArea {
    /// Directory name of this area
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Toolchain => "node",
            Self::Source => "source",
        }
    }
}

impl fmt::Display for CacheArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Cache root of one instance
#[derive(Debug, Clone)]
pub struct CacheRoot {
    base: PathBuf,
    identity: InstanceIdentity,
}

impl CacheRoot {
    /// Cache root under an explicit base directory
    pub fn new(base: impl Into<PathBuf>, identity: InstanceIdentity) -> Self {
        Self {
            base: base.into(),
            identity,
        }
    }

    /// Cache root under the system temporary directory
    pub fn in_temp_dir(identity: InstanceIdentity) -> Self {
        Self::new(std::env::temp_dir(), identity)
    }

    /// Identity this root is keyed by
    pub fn identity(&self) -> &InstanceIdentity {
        &self.identity
    }

    /// Path of the cache root, without touching the filesystem
    pub fn path(&self) -> PathBuf {
        self.base.join(self.identity.relative_path())
    }

    /// Path of an area, without touching the filesystem
    pub fn area_path(&self, area: CacheArea) -> PathBuf {
        self.path().join(area.dir_name())
    }

    /// Ensure an area exists and return it
    pub async fn resolve_area(&self, area: CacheArea) -> NodeserveResult<PathBuf> {
        let path = self.area_path(area);
        ensure_dir(&path).await?;
        Ok(path)
    }
}

async fn ensure_dir(path: &Path) -> NodeserveResult<()> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| NodeserveError::CacheDirCreate {
            path: path.to_path_buf(),
            source: e,
        })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        fs::set_permissions(path, perms)
            .await
            .map_err(|e| NodeserveError::CacheDirCreate {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    Ok(())
}

/// Remove everything inside `dir`, keeping `dir` itself
pub async fn purge_dir(dir: &Path) -> NodeserveResult<()> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| NodeserveError::io(format!("reading {}", dir.display()), e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| NodeserveError::io(format!("reading {}", dir.display()), e))?
    {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| NodeserveError::io(format!("inspecting {}", path.display()), e))?;

        let removed = if file_type.is_dir() {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };
        removed.map_err(|e| NodeserveError::io(format!("removing {}", path.display()), e))?;
        debug!("Purged {}", path.display());
    }

    Ok(())
}
