//! Upload and download command implementations

use repo_core::{SyncEngine, SyncEvent, SyncOptions};
use repo_tree::ObjectTree;

use super::{Status, print_error, print_warning};
use crate::context::Context;
use crate::error::Result;

/// Copy the repository's state to the server.
pub fn run_upload(context: &Context, patterns: &[String], options: SyncOptions) -> Result<Status> {
    let local = context.local_tree();
    let remote = context.server_tree()?;
    transfer(context, &local, &remote, patterns, options)
}

/// Copy the server's state into the repository.
pub fn run_download(
    context: &Context,
    patterns: &[String],
    options: SyncOptions,
) -> Result<Status> {
    let local = context.local_tree();
    let remote = context.server_tree()?;
    transfer(context, &remote, &local, patterns, options)
}

fn transfer(
    context: &Context,
    source: &dyn ObjectTree,
    destination: &dyn ObjectTree,
    patterns: &[String],
    options: SyncOptions,
) -> Result<Status> {
    let patterns = context.patterns(patterns)?;
    tracing::debug!(
        source = %source.side(),
        destination = %destination.side(),
        ?options,
        "transferring"
    );
    let report = SyncEngine::new(source, destination, context.layout(), options).run(&patterns)?;

    for event in &report.events {
        match event {
            SyncEvent::Warning(message) => print_warning(message),
            SyncEvent::Error(message) => print_error(message),
            change => println!("{}", change),
        }
    }
    Ok(Status::from_success(report.success()))
}
