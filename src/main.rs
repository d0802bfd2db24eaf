//! Nodeserve - build and serve a static web app
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use nodeserve::cli::{Cli, Commands, LogFormat};
use nodeserve::error::NodeserveResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::from(e.category().exit_code())
        }
    }
}

async fn run() -> NodeserveResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Serve(args) => nodeserve::cli::commands::serve(args).await,
        Commands::Build(args) => nodeserve::cli::commands::build(args).await,
        Commands::Validate(args) => nodeserve::cli::commands::validate(args).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; RUST_LOG wins when set
fn init_logging(verbose: u8, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("nodeserve=warn"),
        1 => EnvFilter::new("nodeserve=info"),
        _ => EnvFilter::new("nodeserve=debug"),
    });

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}
