//! Engines behind the knife-sync commands
//!
//! Every engine works on `&dyn ObjectTree`, so the same code serves the
//! local repository and the server in either direction:
//!
//! - **diff**: classify paths as added, deleted, modified or type-changed
//! - **sync**: upload and download with purge, dry-run and force
//! - **delete**: remove paths from one or both sides
//! - **deps**: dependency closures over run lists and cookbook metadata
//! - **list**: the `knife-sync list` output
//!
//! ```text
//!            repo-cli
//!               |
//!           repo-core
//!               |
//!    +----------+----------+
//!    |          |          |
//! repo-fs   repo-remote    |
//!    |          |          |
//!    +------ repo-tree ----+
//! ```

pub mod delete;
pub mod deps;
pub mod diff;
pub mod error;
pub mod list;
pub mod sync;

pub use delete::{DeleteOptions, DeleteOutcome, DeleteReport, DeleteSides, delete};
pub use deps::{DependencyGraph, DepsLine, DepsOptions, DepsReport, DepsResolver};
pub use diff::{
    DiffEntry, DiffFilter, DiffFormat, DiffItem, DiffOptions, DiffReport, DiffStatus, Differ,
};
pub use error::{Error, Result};
pub use list::{ListOptions, ListReport, list};
pub use sync::{SyncEngine, SyncEvent, SyncOptions, SyncReport};
