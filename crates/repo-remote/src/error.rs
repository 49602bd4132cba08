//! Error types for repo-remote

use std::path::PathBuf;

/// Result type for REST calls
pub type Result<T> = std::result::Result<T, RestError>;

/// Failures a REST endpoint can report
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("404 Not Found")]
    NotFound,

    #[error("409 Conflict: {0}")]
    Conflict(String),

    #[error("403 Forbidden: {0}")]
    Forbidden(String),

    #[error("405 Method Not Allowed: {0}")]
    MethodNotAllowed(String),

    #[error("400 Bad Request: {0}")]
    BadRequest(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never got a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// The in-memory server could not load or save its state file
    #[error("Server state at {path}: {message}")]
    Storage { path: PathBuf, message: String },
}

impl RestError {
    /// Build from an HTTP status and response body.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => Self::BadRequest(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound,
            405 => Self::MethodNotAllowed(message),
            409 => Self::Conflict(message),
            _ => Self::Status { status, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
