//! Build command - provision without serving

use crate::cli::args::{BuildArgs, OutputFormat};
use crate::error::NodeserveResult;
use console::style;

/// Execute the build command
pub async fn execute(args: BuildArgs) -> NodeserveResult<()> {
    let config = args.config.load().await?;
    config.validate(&args.config.name)?;
    let pipeline = super::pipeline(&args.config)?;
    let (cancel, watcher) = super::cancel_on_interrupt();

    let result = pipeline.provision(&cancel, &config).await;
    watcher.abort();
    let output = result?;

    match args.format {
        OutputFormat::Text => println!(
            "{} Build output at {}",
            style("✓").green(),
            style(output.root().display()).cyan()
        ),
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "name": args.config.name,
                "source": config.path,
                "output": output.root(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
