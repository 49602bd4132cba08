//! The capability every backend implements
//!
//! The differ, sync engine, delete engine and dependency resolver only ever
//! see `&dyn ObjectTree`, never a concrete backend.

use crate::entry::{Content, EntryKind, Side};
use crate::error::Result;
use crate::path::ChefPath;

/// Flags that change how a backend writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Overwrite frozen cookbooks
    pub force: bool,
    /// Mark uploaded cookbooks frozen
    pub freeze: bool,
}

/// A hierarchical namespace of objects.
pub trait ObjectTree: Send + Sync {
    fn side(&self) -> Side;

    /// `None` when the path does not exist.
    fn kind(&self, path: &ChefPath) -> Result<Option<EntryKind>>;

    fn exists(&self, path: &ChefPath) -> Result<bool> {
        Ok(self.kind(path)?.is_some())
    }

    fn is_container(&self, path: &ChefPath) -> Result<bool> {
        Ok(self.kind(path)?.is_some_and(|k| k.is_container()))
    }

    /// Child names in lexical order.
    fn list(&self, path: &ChefPath) -> Result<Vec<String>>;

    fn read(&self, path: &ChefPath) -> Result<Content>;

    /// Create `name` under `parent`. `None` content creates a container.
    fn create_child(
        &self,
        parent: &ChefPath,
        name: &str,
        content: Option<&Content>,
        options: &WriteOptions,
    ) -> Result<()>;

    fn update(&self, path: &ChefPath, content: &Content, options: &WriteOptions) -> Result<()>;

    fn delete(&self, path: &ChefPath, recursive: bool) -> Result<()>;

    /// Whether this backend could ever hold such a child.
    fn can_have_child(&self, parent: &ChefPath, name: &str, is_container: bool) -> bool;

    /// Whether the subtree at `path` can only be written as a whole.
    fn copies_as_unit(&self, _path: &ChefPath) -> bool {
        false
    }

    /// How to name `path` in user-facing messages.
    fn display_path(&self, path: &ChefPath) -> String {
        path.to_string()
    }
}
