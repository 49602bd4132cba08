//! Error types for repo-tree

use std::fmt;
use std::path::PathBuf;

use crate::path::ChefPath;

/// Result type for object tree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by object tree backends
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Path absent where it was required
    #[error("{path}: No such file or directory")]
    NotFound { path: ChefPath },

    /// The backend refused an operation on an existing path
    #[error("{path} {reason}")]
    Refused { path: ChefPath, reason: Refusal },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Failed to parse config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn not_found(path: &ChefPath) -> Self {
        Self::NotFound { path: path.clone() }
    }

    pub fn refused(path: &ChefPath, reason: Refusal) -> Self {
        Self::Refused {
            path: path.clone(),
            reason,
        }
    }

    /// Shorthand for a generic `failed to <operation>: <message>` refusal.
    pub fn failed(path: &ChefPath, operation: Operation, message: impl Into<String>) -> Self {
        Self::refused(
            path,
            Refusal::Failed {
                operation,
                message: message.into(),
            },
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The namespace path this error is about, if any.
    pub fn path(&self) -> Option<&ChefPath> {
        match self {
            Self::NotFound { path } | Self::Refused { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The refusal reason, if the backend refused the operation.
    pub fn refusal(&self) -> Option<&Refusal> {
        match self {
            Self::Refused { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// The mutating operations a backend may refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    CreateChild,
    Update,
    Delete,
}

impl Operation {
    /// Verb phrase used in `failed to <verb>` messages.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::CreateChild => "create_child",
            Self::Update => "write",
            Self::Delete => "delete",
        }
    }
}

fn verb(operation: &Operation) -> &'static str {
    operation.verb()
}

/// Phrase used in `cannot <phrase>` messages.
fn forbidden(operation: &Operation) -> &'static str {
    match operation {
        Operation::Read => "be read",
        Operation::CreateChild => "have a child created under it",
        Operation::Update => "be updated",
        Operation::Delete => "be deleted",
    }
}

/// Why a backend refused an operation on a path.
///
/// Display renders the part of the message that follows the path, so
/// callers can interleave their own context such as the backend side.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Refusal {
    #[error("must be deleted recursively!  Pass -r to knife delete.")]
    MustRecurse,

    /// Root, top-level collections and other system paths
    #[error("cannot {}.", forbidden(.operation))]
    Protected { operation: Operation },

    #[error("cannot {} (default environment cannot be modified).", forbidden(.operation))]
    DefaultEnvironment { operation: Operation },

    #[error("cannot be updated: {kind} are immutable once uploaded.")]
    Immutable { kind: String },

    #[error("failed to write: Cookbook {cookbook} is frozen")]
    Frozen { cookbook: String },

    #[error("failed to {}: Name must be '{expected}' (is '{actual}')", verb(.operation))]
    NameMismatch {
        operation: Operation,
        expected: String,
        actual: String,
    },

    #[error("failed to {}: Parse error reading JSON: {message}", verb(.operation))]
    Parse { operation: Operation, message: String },

    #[error("already exists")]
    AlreadyExists,

    #[error("is not a directory")]
    NotADirectory,

    #[error("failed to {}: {message}", verb(.operation))]
    Failed { operation: Operation, message: String },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verb())
    }
}
