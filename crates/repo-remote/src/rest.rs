//! The REST capability the server backend is written against

use serde_json::Value;

use crate::error::Result;

/// A server API addressed by paths such as `/roles/web`.
///
/// Request signing and transport details live behind this trait.
/// Implementations return [`RestError::NotFound`](crate::RestError::NotFound)
/// for missing objects so callers can tell absence from failure.
pub trait RestApi: Send + Sync {
    fn get(&self, path: &str) -> Result<Value>;

    fn put(&self, path: &str, body: &Value) -> Result<Value>;

    fn post(&self, path: &str, body: &Value) -> Result<Value>;

    fn delete(&self, path: &str) -> Result<Value>;

    /// Raw bytes, used for cookbook file contents.
    fn get_bytes(&self, path: &str) -> Result<Vec<u8>>;

    fn put_bytes(&self, path: &str, body: &[u8]) -> Result<()>;
}
