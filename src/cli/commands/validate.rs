//! Validate command - check configuration offline

use crate::cache::InstanceIdentity;
use crate::cli::args::ValidateArgs;
use crate::error::NodeserveResult;
use crate::reference::RepositoryReference;
use console::style;

/// Execute the validate command
pub async fn execute(args: ValidateArgs) -> NodeserveResult<()> {
    let config = args.config.load().await?;
    let identity = InstanceIdentity::new(args.config.name.as_str())?;
    config.validate(identity.name())?;
    let reference = RepositoryReference::parse(&config.path)?;

    println!("{} Configuration is valid", style("✓").green());
    println!();
    println!("  {:<16} {}", style("Instance").bold(), identity);
    println!("  {:<16} {}", style("Repository").bold(), reference);
    println!(
        "  {:<16} {}",
        style("Snapshot").bold(),
        reference.snapshot_url()
    );
    println!("  {:<16} {}", style("Node").bold(), config.node_version());
    println!("  {:<16} {}", style("Build script").bold(), config.build_script());
    println!("  {:<16} {}", style("Output").bold(), config.build_directory());
    println!("  {:<16} {}", style("Port").bold(), config.port());
    if config.access_token().is_some() {
        println!("  {:<16} {}", style("Access token").bold(), style("set").dim());
    }

    Ok(())
}
