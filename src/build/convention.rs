//! Bundler detection and credential environment synthesis
//!
//! Bundlers only expose environment variables to client code when they
//! carry the bundler's prefix. The project's `package.json` is sniffed for
//! a known bundler name and the credentials are named accordingly.

use std::fmt;
use std::path::Path;
use tracing::debug;

/// Manifest inspected for the bundler
pub const MANIFEST: &str = "package.json";

/// Variable carrying the API key
pub const API_KEY_VAR: &str = "VIAM_API_KEY";

/// Variable carrying the API key identifier
pub const API_KEY_ID_VAR: &str = "VIAM_API_KEY_ID";

/// Bundler whose variable naming the build follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildConvention {
    /// Vite, the default; exposes `VITE_`-prefixed variables
    #[default]
    Vite,
    /// Rollup
    Rollup,
    /// Webpack
    Webpack,
}

impl BuildConvention {
    /// Detect the convention of the project at `project_dir`.
    ///
    /// An unreadable manifest falls back to the default.
    pub async fn detect(project_dir: &Path) -> Self {
        match tokio::fs::read_to_string(project_dir.join(MANIFEST)).await {
            Ok(manifest) => Self::from_manifest(&manifest),
            Err(e) => {
                debug!("No readable {} ({}), assuming vite", MANIFEST, e);
                Self::default()
            }
        }
    }

    /// Detect the convention from manifest text
    pub fn from_manifest(manifest: &str) -> Self {
        if manifest.contains("rollup") {
            Self::Rollup
        } else if manifest.contains("wepback") {
            // Literal token, not the bundler's spelling
            Self::Webpack
        } else {
            Self::Vite
        }
    }

    /// Prefix required on variables exposed to client code
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Self::Vite => "VITE_",
            Self::Rollup | Self::Webpack => "",
        }
    }
}

impl fmt::Display for BuildConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vite => "vite",
            Self::Rollup => "rollup",
            Self::Webpack => "webpack",
        };
        write!(f, "{}", name)
    }
}

/// Credentials forwarded into the build
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BuildCredentials {
    /// API key
    pub api_key: String,
    /// API key identifier
    pub api_key_id: String,
}

impl BuildCredentials {
    /// Credentials from explicit values
    pub fn new(api_key: impl Into<String>, api_key_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_key_id: api_key_id.into(),
        }
    }

    /// `NAME=value` assignments under the convention's prefix
    pub fn env_assignments(&self, convention: BuildConvention) -> Vec<String> {
        let prefix = convention.env_prefix();
        vec![
            format!("{}{}={}", prefix, API_KEY_VAR, self.api_key),
            format!("{}{}={}", prefix, API_KEY_ID_VAR, self.api_key_id),
        ]
    }
}

impl fmt::Debug for BuildCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildCredentials")
            .field("api_key", &"<redacted>")
            .field("api_key_id", &"<redacted>")
            .finish()
    }
}
