//! Command implementations for knife-sync
//!
//! Each command prints results to stdout and per-path problems to stderr
//! as it goes, then returns a [`Status`] that becomes the exit code.

pub mod delete;
pub mod deps;
pub mod diff;
pub mod list;
pub mod sync;

use std::fmt::Display;

use colored::Colorize;

pub use delete::run_delete;
pub use deps::run_deps;
pub use diff::run_diff;
pub use list::run_list;
pub use sync::{run_download, run_upload};

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    /// At least one path failed
    Failure,
    /// `deps` named or reached objects that do not exist
    Missing,
}

impl Status {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Missing => 2,
        }
    }

    fn from_success(success: bool) -> Self {
        if success { Self::Success } else { Self::Failure }
    }
}

pub(crate) fn print_error(message: impl Display) {
    eprintln!("{} {}", "ERROR:".red().bold(), message);
}

pub(crate) fn print_warning(message: impl Display) {
    eprintln!("{} {}", "WARN:".yellow().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Status::Success.code(), 0);
        assert_eq!(Status::Failure.code(), 1);
        assert_eq!(Status::Missing.code(), 2);
        assert_eq!(Status::from_success(false), Status::Failure);
    }
}
