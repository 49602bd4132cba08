//! Deps command implementation

use repo_core::{DepsOptions, DepsResolver};
use repo_fs::LocalTree;
use repo_remote::ServerTree;
use repo_tree::ObjectTree;

use super::{Status, print_error};
use crate::context::Context;
use crate::error::Result;

/// Print the dependency closure of each path.
///
/// Missing objects are reported as they are found and make the command
/// exit with [`Status::Missing`].
pub fn run_deps(
    context: &Context,
    patterns: &[String],
    remote: bool,
    options: DepsOptions,
) -> Result<Status> {
    options.validate()?;
    let patterns = context.patterns(patterns)?;

    let local_tree: LocalTree;
    let server_tree: ServerTree;
    let tree: &dyn ObjectTree = if remote {
        server_tree = context.server_tree()?;
        &server_tree
    } else {
        local_tree = context.local_tree();
        &local_tree
    };

    let report = DepsResolver::new(tree, context.layout()).run(&patterns, &options)?;
    for line in &report.lines {
        println!("{}", line);
    }
    for path in &report.missing {
        print_error(format!("{}: No such file or directory", path));
    }
    for error in &report.errors {
        print_error(error);
    }

    Ok(if !report.missing.is_empty() {
        Status::Missing
    } else {
        Status::from_success(report.success())
    })
}
