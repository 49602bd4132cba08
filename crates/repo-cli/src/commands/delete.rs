//! Delete command implementation

use std::io::IsTerminal;

use dialoguer::Confirm;
use repo_core::{DeleteOptions, DeleteSides};
use repo_fs::LocalTree;
use repo_remote::ServerTree;
use repo_tree::{ObjectTree, Side};

use super::{Status, print_error};
use crate::context::Context;
use crate::error::Result;

/// Run the delete command.
///
/// Asks for confirmation when stdin is a terminal unless `assume_yes`.
pub fn run_delete(
    context: &Context,
    patterns: &[String],
    options: DeleteOptions,
    assume_yes: bool,
) -> Result<Status> {
    let patterns = context.patterns(patterns)?;

    if !assume_yes && std::io::stdin().is_terminal() {
        let names: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Do you really want to delete {} ({})?",
                names.join(", "),
                describe(options.sides)
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Nothing deleted.");
            return Ok(Status::Success);
        }
    }

    let local_tree: LocalTree;
    let server_tree: ServerTree;
    let mut trees: Vec<&dyn ObjectTree> = Vec::new();
    if options.sides.includes(Side::Remote) {
        server_tree = context.server_tree()?;
        trees.push(&server_tree);
    }
    if options.sides.includes(Side::Local) {
        local_tree = context.local_tree();
        trees.push(&local_tree);
    }

    let report = repo_core::delete(&trees, &patterns, &options);
    for outcome in &report.outcomes {
        if outcome.is_failure() {
            print_error(outcome);
        } else {
            println!("{}", outcome);
        }
    }
    Ok(Status::from_success(report.success()))
}

fn describe(sides: DeleteSides) -> &'static str {
    match sides {
        DeleteSides::Remote => "on the server",
        DeleteSides::Local => "in the local repository",
        DeleteSides::Both => "on the server and in the local repository",
    }
}
