//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use repo_tree::RepoMode;

/// knife-sync - Upload, download, diff and inspect a Chef repository
#[derive(Parser, Debug)]
#[command(name = "knife-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Options accepted by every command
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: nearest knife.toml, then ~/.chef/knife.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Local repository root
    #[arg(long, global = true, value_name = "DIR")]
    pub repo: Option<PathBuf>,

    /// Server URL (http://, https:// or file://<state.json>)
    #[arg(long, global = true, env = "KNIFE_SYNC_SERVER_URL", value_name = "URL")]
    pub server_url: Option<String>,

    /// Store cookbooks locally as <name>-<version> directories
    #[arg(long, global = true)]
    pub versioned_cookbooks: bool,

    /// Top-level collections in play (static, everything, hosted_everything)
    #[arg(long, global = true, value_name = "MODE")]
    pub repo_mode: Option<RepoMode>,
}

/// Flags shared by upload and download
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferArgs {
    /// Delete destination entries that the source does not have
    #[arg(long)]
    pub purge: bool,

    /// Only create new entries, never update existing ones
    #[arg(long)]
    pub no_diff: bool,

    /// Do not descend into directories below the given paths
    #[arg(long)]
    pub no_recurse: bool,

    /// Write every entry without comparing, even frozen cookbooks
    #[arg(long)]
    pub force: bool,

    /// Show what would change without changing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Paths to transfer, relative to the current directory or absolute
    #[arg(required = true, value_name = "PATH")]
    pub patterns: Vec<String>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List objects on the server (or locally with --local)
    ///
    /// Examples:
    ///   knife-sync list /roles
    ///   knife-sync list -R /cookbooks/nginx
    ///   knife-sync list --local 'roles/web*'
    List {
        /// List directories recursively
        #[arg(short = 'R', long)]
        recursive: bool,

        /// Print full paths instead of per-directory blocks
        #[arg(short = 'f', long)]
        flat: bool,

        /// Append a slash to directories
        #[arg(short = 'p')]
        dir_slash: bool,

        /// List the local repository instead of the server
        #[arg(long)]
        local: bool,

        #[arg(value_name = "PATH")]
        patterns: Vec<String>,
    },

    /// Compare the server (a/) with the local repository (b/)
    Diff {
        /// Show only the names of changed paths
        #[arg(long, conflicts_with = "name_status")]
        name_only: bool,

        /// Show changed paths with a status letter
        #[arg(long)]
        name_status: bool,

        /// Select statuses: A, D, M, T (lower case excludes)
        #[arg(long, value_name = "LETTERS")]
        diff_filter: Option<String>,

        /// Do not descend into directories below the given paths
        #[arg(long)]
        no_recurse: bool,

        #[arg(value_name = "PATH")]
        patterns: Vec<String>,
    },

    /// Copy objects from the server into the local repository
    Download {
        #[command(flatten)]
        transfer: TransferArgs,
    },

    /// Copy objects from the local repository to the server
    Upload {
        #[command(flatten)]
        transfer: TransferArgs,

        /// Freeze uploaded cookbooks
        #[arg(long)]
        freeze: bool,
    },

    /// Delete objects from the server, the repository, or both
    Delete {
        /// Delete from the local repository only
        #[arg(long, conflicts_with = "both")]
        local: bool,

        /// Delete from both the server and the local repository
        #[arg(long)]
        both: bool,

        /// Delete directories and everything under them
        #[arg(short, long)]
        recursive: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        #[arg(required = true, value_name = "PATH")]
        patterns: Vec<String>,
    },

    /// Show what roles, environments and cookbooks an object depends on
    Deps {
        /// Read objects from the server instead of the repository
        #[arg(long)]
        remote: bool,

        /// Print an indented tree per path
        #[arg(long)]
        tree: bool,

        /// Only show direct dependencies (requires --tree)
        #[arg(long)]
        no_recurse: bool,

        #[arg(required = true, value_name = "PATH")]
        patterns: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_upload_flags() {
        let cli = Cli::try_parse_from([
            "knife-sync",
            "upload",
            "--purge",
            "--freeze",
            "-n",
            "/cookbooks/nginx",
        ])
        .unwrap();
        match cli.command {
            Commands::Upload { transfer, freeze } => {
                assert!(transfer.purge);
                assert!(transfer.dry_run);
                assert!(freeze);
                assert_eq!(transfer.patterns, vec!["/cookbooks/nginx".to_string()]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_download_rejects_freeze() {
        assert!(Cli::try_parse_from(["knife-sync", "download", "--freeze", "/"]).is_err());
    }

    #[test]
    fn test_upload_requires_a_path() {
        assert!(Cli::try_parse_from(["knife-sync", "upload"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "knife-sync",
            "list",
            "/roles",
            "--repo-mode",
            "static",
            "--server-url",
            "file:///tmp/state.json",
        ])
        .unwrap();
        assert_eq!(cli.global.repo_mode, Some(RepoMode::Static));
        assert_eq!(
            cli.global.server_url.as_deref(),
            Some("file:///tmp/state.json")
        );
    }

    #[test]
    fn test_unknown_repo_mode_is_rejected() {
        assert!(Cli::try_parse_from(["knife-sync", "list", "--repo-mode", "chaos"]).is_err());
    }

    #[test]
    fn test_delete_sides_conflict() {
        assert!(
            Cli::try_parse_from(["knife-sync", "delete", "--local", "--both", "/roles/x.json"])
                .is_err()
        );
    }

    #[test]
    fn test_list_short_flags() {
        let cli = Cli::try_parse_from(["knife-sync", "list", "-R", "-f", "-p"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::List {
                recursive: true,
                flat: true,
                dir_slash: true,
                local: false,
                patterns: vec![],
            }
        );
    }
}
