//! Error types for nodeserve
//!
//! All modules use `NodeserveResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for nodeserve operations
pub type NodeserveResult<T> = Result<T, NodeserveError>;

/// All errors that can occur in nodeserve
#[derive(Error, Debug)]
pub enum NodeserveError {
    // Configuration errors
    #[error("path is required")]
    PathRequired,

    #[error("only git paths are currently supported")]
    UnsupportedScheme,

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("build_directory must be a relative path inside the project: {0}")]
    InvalidBuildDirectory(String),

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Invalid instance name {0:?}: must be a single non-empty path component")]
    InvalidInstanceName(String),

    // Reference errors
    #[error("URL does not match the expected format: {0}")]
    ReferenceParse(String),

    // Acquisition errors
    #[error("Failed to create cache directory {path}: {source}")]
    CacheDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download failed: {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Failed to extract {path}: {reason}")]
    Extract { path: PathBuf, reason: String },

    #[error("Unsupported archive format: {0}")]
    UnsupportedArchive(PathBuf),

    #[error("Could not locate the extracted root of {0}")]
    ArchiveRootMissing(PathBuf),

    // Build errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Build step failed: {command}, exit code: {code}\n{output}")]
    BuildStep {
        command: String,
        code: i32,
        output: String,
    },

    #[error("Build output directory not found: {0}")]
    OutputMissing(PathBuf),

    #[error("Build output is not a directory: {0}")]
    OutputNotDirectory(PathBuf),

    // Lifecycle errors
    #[error("Failed to start file server on port {port}: {source}")]
    ServeBind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("not implemented")]
    NotImplemented,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad class of a failure, used by callers that branch on the pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid or missing configuration, detected before any I/O
    Configuration,
    /// Malformed repository reference
    Parse,
    /// Network, extraction or cache directory failure
    Acquisition,
    /// Subprocess failure or missing build output
    Build,
    /// Cancellation, serving and everything else
    Lifecycle,
}

impl ErrorCategory {
    /// Process exit code for a failure in this category
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Configuration | Self::Parse => 2,
            Self::Acquisition => 3,
            Self::Build => 4,
            Self::Lifecycle => 1,
        }
    }
}

impl NodeserveError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a download error
    pub fn download(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Download {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an extraction error
    pub fn extract(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Extract {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Which stage of provisioning produced this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::PathRequired
            | Self::UnsupportedScheme
            | Self::ConfigInvalid { .. }
            | Self::InvalidBuildDirectory(_)
            | Self::ConfigNotFound(_)
            | Self::InvalidInstanceName(_)
            | Self::Json(_) => ErrorCategory::Configuration,
            Self::ReferenceParse(_) => ErrorCategory::Parse,
            Self::CacheDirCreate { .. }
            | Self::Download { .. }
            | Self::Extract { .. }
            | Self::UnsupportedArchive(_)
            | Self::ArchiveRootMissing(_) => ErrorCategory::Acquisition,
            Self::CommandFailed { .. }
            | Self::BuildStep { .. }
            | Self::OutputMissing(_)
            | Self::OutputNotDirectory(_) => ErrorCategory::Build,
            Self::ServeBind { .. }
            | Self::Cancelled
            | Self::NotImplemented
            | Self::Io { .. }
            | Self::Internal(_) => ErrorCategory::Lifecycle,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::PathRequired | Self::UnsupportedScheme | Self::ReferenceParse(_) => {
                Some("Use a path like: git+https://github.com/<owner>/<repo>#<ref>")
            }
            Self::Download { .. } => {
                Some("Check network access; private repositories need --access-token")
            }
            Self::OutputMissing(_) | Self::InvalidBuildDirectory(_) => {
                Some("Set --build-directory to where the build writes, e.g. dist")
            }
            Self::ServeBind { .. } => Some("Choose a free port with --port"),
            _ => None,
        }
    }
}
