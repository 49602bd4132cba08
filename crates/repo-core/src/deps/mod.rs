//! Dependency resolution for `knife-sync deps`
//!
//! - **graph**: the cached edges between paths
//! - **resolver**: flat and tree traversals over a single backend

mod graph;
mod resolver;

pub use graph::DependencyGraph;
pub use resolver::{DepsLine, DepsOptions, DepsReport, DepsResolver};
