//! Error types for repo-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that abort a command
///
/// Per-path failures are not errors here: commands print them as they go
/// and report a failing [`crate::commands::Status`] instead.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from repo-core
    #[error(transparent)]
    Core(#[from] repo_core::Error),

    #[error(transparent)]
    Tree(#[from] repo_tree::Error),

    /// Opening the server failed
    #[error(transparent)]
    Remote(#[from] repo_remote::RestError),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Interactive prompt error
    #[error("Interactive prompt error: {0}")]
    Dialoguer(#[from] dialoguer::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Core(repo_core::Error::Usage(_)) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_error_user() {
        let error = CliError::user("test error");
        assert_eq!(format!("{}", error), "test error");
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_usage_errors_exit_with_two() {
        let error = CliError::from(repo_core::Error::Usage("--no-recurse requires --tree".into()));
        assert_eq!(error.to_string(), "--no-recurse requires --tree");
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_self_dependency_exits_with_one() {
        let error = CliError::from(repo_core::Error::SelfDependency {
            cookbook: "nginx".into(),
        });
        assert_eq!(error.to_string(), "Cookbook nginx depends on itself");
        assert_eq!(error.exit_code(), 1);
    }
}
