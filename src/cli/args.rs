//! CLI argument definitions using clap derive

use crate::build::BuildCredentials;
use crate::config::{Config, ConfigManager};
use crate::error::NodeserveResult;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Instance name used when none is given
pub const DEFAULT_INSTANCE_NAME: &str = "static-server";

/// Nodeserve - build and serve a static web app from a GitHub repository
///
/// Downloads a pinned Node.js toolchain and the project sources, runs the
/// project's build, and serves the output directory over HTTP.
#[derive(Parser, Debug)]
#[command(name = "nodeserve")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the project and serve its output until interrupted
    Serve(ServeArgs),

    /// Build the project and print the output directory
    Build(BuildArgs),

    /// Check a configuration without downloading anything
    Validate(ValidateArgs),
}

/// Configuration shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Configuration file path (JSON, or TOML by extension)
    #[arg(short, long, env = "NODESERVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Source location, e.g. git+https://github.com/<owner>/<repo>#<ref>
    #[arg(long)]
    pub path: Option<String>,

    /// Token for private repositories
    #[arg(long, env = "NODESERVE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Node.js version to install (default 22.19.0)
    #[arg(long)]
    pub node_version: Option<String>,

    /// npm script that builds the project (default "build")
    #[arg(long)]
    pub build_command: Option<String>,

    /// Build output directory relative to the project (default "dist")
    #[arg(long)]
    pub build_directory: Option<String>,

    /// Port to serve on (default 8888)
    #[arg(long)]
    pub port: Option<u16>,

    /// Instance name, used to key the download cache
    #[arg(long, default_value = DEFAULT_INSTANCE_NAME)]
    pub name: String,

    /// Base directory for the download cache (defaults to the system temp dir)
    #[arg(long)]
    pub cache_root: Option<PathBuf>,

    /// API key forwarded into the build
    #[arg(long, env = "VIAM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API key identifier forwarded into the build
    #[arg(long, env = "VIAM_API_KEY_ID", hide_env_values = true)]
    pub api_key_id: Option<String>,
}

impl ConfigArgs {
    /// Settings given on the command line, as a config overlay
    pub fn overrides(&self) -> Config {
        Config {
            path: self.path.clone().unwrap_or_default(),
            access_token: self.access_token.clone(),
            node_version: self.node_version.clone(),
            build_command: self.build_command.clone(),
            build_directory: self.build_directory.clone(),
            port: self.port,
        }
    }

    /// Load the config file and overlay the command line
    pub async fn load(&self) -> NodeserveResult<Config> {
        let manager = match &self.config {
            Some(path) => ConfigManager::with_path(path.clone()),
            None => ConfigManager::new(),
        };
        let mut config = manager.load().await?;
        config.merge(self.overrides());
        Ok(config)
    }

    /// Credentials for the build, empty when not given
    pub fn credentials(&self) -> BuildCredentials {
        BuildCredentials::new(
            self.api_key.clone().unwrap_or_default(),
            self.api_key_id.clone().unwrap_or_default(),
        )
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}
