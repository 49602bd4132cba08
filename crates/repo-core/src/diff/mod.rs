//! Comparing two object trees
//!
//! - **differ**: the side-by-side walk and per-path classification
//! - **format**: `--name-only`, `--name-status` and unified text output

mod differ;
mod format;

pub use differ::{
    DiffEntry, DiffItem, DiffOptions, DiffReport, DiffStatus, Differ, holdable_bundle,
    object_identity,
};
pub(crate) use differ::could_hold;
pub use format::{DiffFilter, DiffFormat, name_line, patch};
