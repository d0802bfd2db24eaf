//! Configuration management for nodeserve

pub mod schema;

pub use schema::Config;

use crate::error::{NodeserveError, NodeserveResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Configuration file format, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json` and anything unrecognised
    Json,
    /// `.toml`
    Toml,
}

impl ConfigFormat {
    /// Pick the format for a config file path
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
    explicit: bool,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            explicit: false,
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            explicit: true,
        }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nodeserve")
            .join("config.json")
    }

    /// Load configuration.
    ///
    /// A missing default file yields an empty config; a missing file that
    /// was asked for explicitly is an error.
    pub async fn load(&self) -> NodeserveResult<Config> {
        if !self.config_path.exists() {
            if self.explicit {
                return Err(NodeserveError::ConfigNotFound(self.config_path.clone()));
            }
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> NodeserveResult<Config> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            NodeserveError::io(format!("reading config from {}", path.display()), e)
        })?;

        let parsed = match ConfigFormat::from_path(path) {
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::from_str(&content).map_err(|e| e.to_string()),
        };

        parsed.map_err(|reason| NodeserveError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_explicit_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("nonexistent.json"));

        let err = manager.load().await.unwrap_err();
        assert!(matches!(err, NodeserveError::ConfigNotFound(_)));
    }

    #[tokio::test]
    async fn load_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("server.json");
        std::fs::write(
            &path,
            r#"{"path": "git+https://github.com/acme/widgets#v2", "port": 8080}"#,
        )
        .unwrap();

        let config = ConfigManager::with_path(path).load().await.unwrap();
        assert_eq!(config.path, "git+https://github.com/acme/widgets#v2");
        assert_eq!(config.port(), 8080);
    }

    #[tokio::test]
    async fn load_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("server.toml");
        std::fs::write(
            &path,
            "path = \"git+https://github.com/acme/widgets\"\nbuild_directory = \"build\"\n",
        )
        .unwrap();

        let config = ConfigManager::with_path(path).load().await.unwrap();
        assert_eq!(config.build_directory(), "build");
    }

    #[tokio::test]
    async fn invalid_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("server.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ConfigManager::with_path(path.clone()).load().await.unwrap_err();
        match err {
            NodeserveError::ConfigInvalid { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a/config.TOML")),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("config.json")),
            ConfigFormat::Json
        );
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Json);
    }
}
