//! Object tree abstraction for knife-sync
//!
//! Defines the namespace model shared by the local repository and the
//! remote server: paths, entries, the [`ObjectTree`] capability, repository
//! layout, per-kind JSON handling, run lists and cookbook bundles.

pub mod config;
pub mod cookbook;
pub mod entry;
pub mod error;
pub mod glob;
pub mod layout;
pub mod objects;
pub mod path;
pub mod pattern;
pub mod run_list;
pub mod tree;

pub use config::RepoConfig;
pub use cookbook::{CookbookBundle, CookbookMetadata, FileRole};
pub use entry::{Content, EntryKind, Side};
pub use error::{Error, Operation, Refusal, Result};
pub use layout::{Collection, Layout, Location, RepoMode};
pub use objects::ObjectKind;
pub use path::ChefPath;
pub use pattern::PathPattern;
pub use run_list::RunListItem;
pub use tree::{ObjectTree, WriteOptions};
