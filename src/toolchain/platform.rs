//! Host platform to Node.js distribution mapping
//!
//! Hosts are described with `darwin`/`amd64`/`386` style names. A lookup
//! table maps the platform to its archive extension, the platform token used
//! in Node file names and the layout of the extracted tree.

use crate::fetch::ArchiveFormat;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where executables live inside an extracted toolchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainLayout {
    /// `<root>/bin/<tool>`
    BinDir,
    /// `<root>/<tool>.cmd` (Windows)
    Root,
}

impl ToolchainLayout {
    /// Directory holding `node`, `npm` and `npx`
    pub fn bin_dir(&self, root: &Path) -> PathBuf {
        match self {
            Self::BinDir => root.join("bin"),
            Self::Root => root.to_path_buf(),
        }
    }

    /// Path to a tool shipped with Node
    pub fn executable(&self, root: &Path, tool: &str) -> PathBuf {
        match self {
            Self::BinDir => self.bin_dir(root).join(tool),
            Self::Root => self.bin_dir(root).join(format!("{}.cmd", tool)),
        }
    }
}

struct PlatformEntry {
    os: &'static str,
    dist_os: &'static str,
    format: ArchiveFormat,
    layout: ToolchainLayout,
}

const PLATFORMS: &[PlatformEntry] = &[
    PlatformEntry {
        os: "darwin",
        dist_os: "darwin",
        format: ArchiveFormat::TarGz,
        layout: ToolchainLayout::BinDir,
    },
    PlatformEntry {
        os: "windows",
        dist_os: "win",
        format: ArchiveFormat::Zip,
        layout: ToolchainLayout::Root,
    },
];

const ARCH_ALIASES: &[(&str, &str)] = &[("amd64", "x64"), ("386", "x86")];

/// Operating system and architecture of the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    /// `linux`, `darwin`, `windows`, ...
    pub os: String,
    /// `amd64`, `arm64`, `386`, ...
    pub arch: String,
}

impl HostPlatform {
    /// Platform from explicit names
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Detect the platform this binary runs on
    pub fn detect() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "x86" => "386",
            "aarch64" => "arm64",
            "powerpc64" => "ppc64",
            other => other,
        };
        Self::new(os, arch)
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Node's name for a host architecture; unknown names pass through
pub fn alias_arch(arch: &str) -> String {
    ARCH_ALIASES
        .iter()
        .find(|(host, _)| host.eq_ignore_ascii_case(arch))
        .map_or_else(|| arch.to_string(), |(_, node)| (*node).to_string())
}

/// Archive format Node publishes for a host OS
pub fn archive_format(os: &str) -> ArchiveFormat {
    lookup(os).map_or(ArchiveFormat::TarXz, |entry| entry.format)
}

fn lookup(os: &str) -> Option<&'static PlatformEntry> {
    PLATFORMS.iter().find(|entry| entry.os.eq_ignore_ascii_case(os))
}

/// A Node.js release resolved for one platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDistribution {
    version: String,
    dist_os: String,
    arch: String,
    format: ArchiveFormat,
    layout: ToolchainLayout,
}

impl NodeDistribution {
    /// Resolve `version` (already `v`-prefixed) for `platform`
    pub fn resolve(version: &str, platform: &HostPlatform) -> Self {
        let entry = lookup(&platform.os);
        Self {
            version: version.to_string(),
            dist_os: entry.map_or_else(|| platform.os.clone(), |e| e.dist_os.to_string()),
            arch: alias_arch(&platform.arch),
            format: entry.map_or(ArchiveFormat::TarXz, |e| e.format),
            layout: entry.map_or(ToolchainLayout::BinDir, |e| e.layout),
        }
    }

    /// `node-<version>-<os>-<arch>`, also the archive's root directory
    pub fn base_name(&self) -> String {
        format!("node-{}-{}-{}", self.version, self.dist_os, self.arch)
    }

    /// File name of the archive
    pub fn archive_name(&self) -> String {
        format!("{}.{}", self.base_name(), self.format.extension())
    }

    /// Download URL on nodejs.org
    pub fn url(&self) -> String {
        format!(
            "https://nodejs.org/dist/{}/{}",
            self.version,
            self.archive_name()
        )
    }

    /// Archive format of this distribution
    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Layout of the extracted tree
    pub fn layout(&self) -> ToolchainLayout {
        self.layout
    }
}
