//! Diff command implementation
//!
//! Compares the server (`a/`) with the local repository (`b/`): an entry
//! only in the repository is "added", one only on the server "deleted".

use repo_core::diff::{name_line, patch};
use repo_core::{DiffFilter, DiffFormat, DiffItem, DiffOptions, Differ};

use super::{Status, print_error, print_warning};
use crate::context::Context;
use crate::error::Result;

pub fn run_diff(
    context: &Context,
    patterns: &[String],
    format: DiffFormat,
    filter: Option<&str>,
    recurse: bool,
) -> Result<Status> {
    let filter = match filter {
        Some(letters) => DiffFilter::parse(letters)?,
        None => DiffFilter::default(),
    };
    let patterns = context.patterns(patterns)?;
    let local = context.local_tree();
    let remote = context.server_tree()?;
    let layout = context.layout();

    let options = DiffOptions {
        recurse,
        ..DiffOptions::default()
    };
    let report = Differ::new(&local, &remote, layout, options).diff(&patterns);

    let mut status = Status::Success;
    for item in &report.items {
        match item {
            DiffItem::Change(entry) if filter.allows(entry.status) => match format {
                DiffFormat::Patch => match patch(entry, &remote, &local, &layout) {
                    Ok(text) => print!("{}", text),
                    Err(e) => {
                        print_error(e);
                        status = Status::Failure;
                    }
                },
                _ => println!("{}", name_line(entry, format)),
            },
            DiffItem::Change(_) => {}
            DiffItem::Warning(message) => print_warning(message),
            DiffItem::Error(e) => {
                print_error(e);
                status = Status::Failure;
            }
            DiffItem::Missing(path) => {
                print_error(format!("{}: No such file or directory", path));
                status = Status::Failure;
            }
        }
    }
    Ok(status)
}
