//! List command implementation

use repo_core::ListOptions;
use repo_fs::LocalTree;
use repo_remote::ServerTree;
use repo_tree::ObjectTree;

use super::{Status, print_error};
use crate::context::Context;
use crate::error::Result;

/// Run the list command against the server, or the repository with `local`.
pub fn run_list(
    context: &Context,
    patterns: &[String],
    local: bool,
    options: ListOptions,
) -> Result<Status> {
    let patterns = context.patterns(patterns)?;
    let local_tree: LocalTree;
    let server_tree: ServerTree;
    let tree: &dyn ObjectTree = if local {
        local_tree = context.local_tree();
        &local_tree
    } else {
        server_tree = context.server_tree()?;
        &server_tree
    };

    let report = repo_core::list(tree, &patterns, &options);
    for line in &report.lines {
        println!("{}", line);
    }
    for error in &report.errors {
        print_error(error);
    }
    Ok(Status::from_success(report.success()))
}
