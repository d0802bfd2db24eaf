//! CLI command implementations

pub mod build;
pub mod serve;
pub mod validate;

pub use build::execute as build;
pub use serve::execute as serve;
pub use validate::execute as validate;

use crate::cache::{CacheRoot, InstanceIdentity};
use crate::cli::args::ConfigArgs;
use crate::error::NodeserveResult;
use crate::fetch::HttpDownloader;
use crate::pipeline::Pipeline;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Pipeline for the instance named on the command line
fn pipeline(args: &ConfigArgs) -> NodeserveResult<Pipeline> {
    let identity = InstanceIdentity::new(args.name.as_str())?;
    let cache = match &args.cache_root {
        Some(base) => CacheRoot::new(base, identity),
        None => CacheRoot::in_temp_dir(identity),
    };
    debug!("Cache root: {}", cache.path().display());
    Ok(Pipeline::new(
        cache,
        Arc::new(HttpDownloader::new()),
        args.credentials(),
    ))
}

/// Token cancelled on Ctrl-C
fn cancel_on_interrupt() -> (CancellationToken, JoinHandle<()>) {
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Interrupted");
                cancel.cancel();
            }
        }
    });
    (cancel, watcher)
}
