//! knife-sync CLI
//!
//! Moves roles, environments, nodes, data bags, cookbooks and the rest of a
//! Chef repository between a local directory and a Chef server.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use repo_core::{
    DeleteOptions, DeleteSides, DepsOptions, DiffFormat, ListOptions, SyncOptions,
};

use cli::{Cli, Commands, TransferArgs};
use commands::Status;
use context::Context;
use error::{CliError, Result};

fn main() {
    match run() {
        Ok(status) => std::process::exit(status.code()),
        Err(e) => {
            eprintln!("{} {}", "FATAL:".red().bold(), e);
            std::process::exit(e.exit_code());
        }
    }
}

fn run() -> Result<Status> {
    let cli = Cli::parse();

    let level = if cli.global.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(cli.global.verbose)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| CliError::user(format!("Failed to set tracing subscriber: {}", e)))?;
    tracing::debug!("Verbose mode enabled");

    let cwd = std::env::current_dir()?;
    let context = Context::resolve(&cli.global, &cwd)?;
    execute_command(cli.command, &context)
}

fn execute_command(cmd: Commands, context: &Context) -> Result<Status> {
    match cmd {
        Commands::List {
            recursive,
            flat,
            dir_slash,
            local,
            patterns,
        } => commands::run_list(
            context,
            &patterns,
            local,
            ListOptions {
                recursive,
                flat,
                dir_slash,
            },
        ),
        Commands::Diff {
            name_only,
            name_status,
            diff_filter,
            no_recurse,
            patterns,
        } => {
            let format = if name_status {
                DiffFormat::NameStatus
            } else if name_only {
                DiffFormat::NameOnly
            } else {
                DiffFormat::Patch
            };
            commands::run_diff(
                context,
                &patterns,
                format,
                diff_filter.as_deref(),
                !no_recurse,
            )
        }
        Commands::Download { transfer } => {
            let options = sync_options(&transfer, false);
            commands::run_download(context, &transfer.patterns, options)
        }
        Commands::Upload { transfer, freeze } => {
            let options = sync_options(&transfer, freeze);
            commands::run_upload(context, &transfer.patterns, options)
        }
        Commands::Delete {
            local,
            both,
            recursive,
            yes,
            patterns,
        } => {
            let sides = match (local, both) {
                (_, true) => DeleteSides::Both,
                (true, false) => DeleteSides::Local,
                (false, false) => DeleteSides::Remote,
            };
            commands::run_delete(context, &patterns, DeleteOptions { sides, recursive }, yes)
        }
        Commands::Deps {
            remote,
            tree,
            no_recurse,
            patterns,
        } => commands::run_deps(
            context,
            &patterns,
            remote,
            DepsOptions {
                tree,
                recurse: !no_recurse,
            },
        ),
    }
}

fn sync_options(transfer: &TransferArgs, freeze: bool) -> SyncOptions {
    SyncOptions {
        purge: transfer.purge,
        recurse: !transfer.no_recurse,
        diff: !transfer.no_diff,
        force: transfer.force,
        freeze,
        dry_run: transfer.dry_run,
    }
}
