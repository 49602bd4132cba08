//! Error types for repo-core

/// Result type for repo-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a whole command.
///
/// Per-path failures never show up here; they are collected into the
/// report of the engine that hit them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error from a tree backend
    #[error(transparent)]
    Tree(#[from] repo_tree::Error),

    /// A cookbook lists itself in its `depends`
    #[error("Cookbook {cookbook} depends on itself")]
    SelfDependency { cookbook: String },

    /// Invalid combination of options
    #[error("{0}")]
    Usage(String),
}
