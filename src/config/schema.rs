//! Configuration schema for nodeserve
//!
//! Mirrors the JSON object a host hands to a static server instance:
//!
//! ```json
//! {
//!   "path": "git+https://github.com/acme/widgets#release-1",
//!   "access_token": "ghp_...",
//!   "node_version": "22.19.0",
//!   "build_command": "build",
//!   "build_directory": "dist",
//!   "port": 8888
//! }
//! ```

use crate::error::{NodeserveError, NodeserveResult};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// Marker every supported source location starts with
pub const GIT_SCHEME: &str = "git+";

/// Node.js release used when `node_version` is not set
pub const DEFAULT_NODE_VERSION: &str = "22.19.0";

/// npm script run when `build_command` is not set
pub const DEFAULT_BUILD_SCRIPT: &str = "build";

/// Output directory used when `build_directory` is not set
pub const DEFAULT_BUILD_DIRECTORY: &str = "dist";

/// Port served when `port` is not set
pub const DEFAULT_PORT: u16 = 8888;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Source location, e.g. `git+https://github.com/<owner>/<repo>#<ref>`
    #[serde(default)]
    pub path: String,

    /// Token sent as a bearer credential when downloading the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Node.js version, with or without a leading `v`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_version: Option<String>,

    /// npm script to run for the build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,

    /// Build output directory, relative to the project root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_directory: Option<String>,

    /// Port for the file server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Config {
    /// Create a config for a source location with every option defaulted
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration found at `path` in the host's config tree.
    ///
    /// Returns the implicit and optional dependency names (always empty),
    /// or the reason the configuration cannot be used.
    pub fn validate(&self, _path: &str) -> NodeserveResult<(Vec<String>, Vec<String>)> {
        if self.path.trim().is_empty() {
            return Err(NodeserveError::PathRequired);
        }
        if !self.path.starts_with(GIT_SCHEME) {
            return Err(NodeserveError::UnsupportedScheme);
        }
        self.build_directory_path()?;
        Ok((Vec::new(), Vec::new()))
    }

    /// Node.js version to install, always carrying a leading `v`
    pub fn node_version(&self) -> String {
        let version = non_blank(&self.node_version).unwrap_or(DEFAULT_NODE_VERSION);
        if version.starts_with('v') {
            version.to_string()
        } else {
            format!("v{}", version)
        }
    }

    /// npm script name to run
    pub fn build_script(&self) -> &str {
        non_blank(&self.build_command).unwrap_or(DEFAULT_BUILD_SCRIPT)
    }

    /// Build output directory relative to the project root
    pub fn build_directory(&self) -> &str {
        non_blank(&self.build_directory).unwrap_or(DEFAULT_BUILD_DIRECTORY)
    }

    /// Build output directory as a path that stays inside the project.
    ///
    /// Absolute paths, drive prefixes and `..` components are rejected.
    pub fn build_directory_path(&self) -> NodeserveResult<&Path> {
        let dir = Path::new(self.build_directory());
        let contained = dir
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if contained {
            Ok(dir)
        } else {
            Err(NodeserveError::InvalidBuildDirectory(
                self.build_directory().to_string(),
            ))
        }
    }

    /// Trimmed access token, if one is configured
    pub fn access_token(&self) -> Option<&str> {
        non_blank(&self.access_token).map(str::trim)
    }

    /// Port for the file server
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Overlay every field that is set in `other` onto `self`
    pub fn merge(&mut self, other: Config) {
        if !other.path.trim().is_empty() {
            self.path = other.path;
        }
        if other.access_token.is_some() {
            self.access_token = other.access_token;
        }
        if other.node_version.is_some() {
            self.node_version = other.node_version;
        }
        if other.build_command.is_some() {
            self.build_command = other.build_command;
        }
        if other.build_directory.is_some() {
            self.build_directory = other.build_directory;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
    }
}

/// Treat missing, empty and whitespace-only strings alike
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}
