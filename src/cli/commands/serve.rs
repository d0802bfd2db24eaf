//! Serve command - build, then serve until interrupted

use crate::cli::args::ServeArgs;
use crate::error::NodeserveResult;
use crate::server::StaticServer;
use console::style;

/// Execute the serve command
pub async fn execute(args: ServeArgs) -> NodeserveResult<()> {
    let config = args.config.load().await?;
    let pipeline = super::pipeline(&args.config)?;
    let (cancel, watcher) = super::cancel_on_interrupt();

    println!("Provisioning {}...", style(&config.path).cyan());
    let server = StaticServer::with_cancellation(config, &pipeline, cancel.clone()).await?;

    println!(
        "{} Serving {} at {}",
        style("✓").green(),
        style(server.output().root().display()).cyan(),
        style(format!("http://{}", server.local_addr())).bold()
    );
    println!("{}", style("Press Ctrl-C to stop").dim());

    cancel.cancelled().await;
    let name = server.name().to_string();
    server.close();
    server.wait().await?;
    watcher.abort();

    println!("{} Instance {} stopped", style("✓").green(), style(name).cyan());
    Ok(())
}
