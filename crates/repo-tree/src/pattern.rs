//! Expansion of wildcard paths against one or more trees

use crate::error::Result;
use crate::glob::{Glob, has_wildcards};
use crate::path::ChefPath;
use crate::tree::ObjectTree;

/// A user-supplied path pattern such as `/roles/web*.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    path: ChefPath,
}

impl PathPattern {
    pub fn new(pattern: impl AsRef<str>) -> Self {
        Self {
            path: ChefPath::new(pattern),
        }
    }

    pub fn as_path(&self) -> &ChefPath {
        &self.path
    }

    pub fn is_exact(&self) -> bool {
        !has_wildcards(self.path.as_str())
    }

    /// Expand against the union of `trees`.
    ///
    /// An exact pattern yields itself whether or not it exists, so callers
    /// can report it as missing. A wildcard segment is matched against the
    /// children each tree lists; parents missing from a tree are skipped.
    pub fn expand(&self, trees: &[&dyn ObjectTree]) -> Result<Vec<ChefPath>> {
        if self.is_exact() {
            return Ok(vec![self.path.clone()]);
        }

        let mut current = vec![ChefPath::root()];
        for segment in self.path.segments() {
            let mut next = Vec::new();
            if has_wildcards(segment) {
                let glob = Glob::new(segment)?;
                for parent in &current {
                    for tree in trees {
                        if !tree.is_container(parent)? {
                            continue;
                        }
                        for name in tree.list(parent)? {
                            if glob.is_match(&name) {
                                next.push(parent.join(&name));
                            }
                        }
                    }
                }
            } else {
                next.extend(current.iter().map(|parent| parent.join(segment)));
            }
            next.sort();
            next.dedup();
            current = next;
        }

        let mut matched = Vec::new();
        for path in current {
            let mut exists = false;
            for tree in trees {
                if tree.exists(&path)? {
                    exists = true;
                    break;
                }
            }
            if exists {
                matched.push(path);
            }
        }
        tracing::debug!(pattern = %self.path, matches = matched.len(), "expanded pattern");
        Ok(matched)
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}
