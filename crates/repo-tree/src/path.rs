//! Absolute, slash-separated paths into the object namespace

use std::fmt;

/// A path into the object namespace, such as `/roles/web.json`.
///
/// Always absolute. Repeated slashes collapse, a trailing slash is dropped,
/// and `.`/`..` segments are resolved lexically. The root is `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChefPath {
    inner: String,
}

impl ChefPath {
    /// The namespace root.
    pub fn root() -> Self {
        Self {
            inner: "/".to_string(),
        }
    }

    /// Create a path from any string, normalizing it.
    ///
    /// Relative input is treated as relative to the root.
    pub fn new(path: impl AsRef<str>) -> Self {
        let raw = path.as_ref().replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        if segments.is_empty() {
            Self::root()
        } else {
            Self {
                inner: format!("/{}", segments.join("/")),
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn is_root(&self) -> bool {
        self.inner == "/"
    }

    /// Join a single child name onto this path.
    pub fn join(&self, name: &str) -> Self {
        if self.is_root() {
            Self::new(format!("/{}", name))
        } else {
            Self::new(format!("{}/{}", self.inner, name))
        }
    }

    /// Get the parent path. The root has no parent.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.inner.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self {
                inner: self.inner[..idx].to_string(),
            }),
            None => None,
        }
    }

    /// The last path segment. The root has no name.
    pub fn name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            self.inner.rsplit('/').next()
        }
    }

    /// Path segments from the root down, empty for the root.
    pub fn segments(&self) -> Vec<&str> {
        self.inner.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Whether `self` is `other` or lies beneath it.
    pub fn starts_with(&self, other: &ChefPath) -> bool {
        if other.is_root() || self == other {
            return true;
        }
        self.inner
            .strip_prefix(&other.inner)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// All ancestors from the first top-level segment down to the parent.
    pub fn ancestors(&self) -> Vec<ChefPath> {
        let mut result = Vec::new();
        let mut current = self.parent();
        while let Some(path) = current {
            if path.is_root() {
                break;
            }
            current = path.parent();
            result.push(path);
        }
        result.reverse();
        result
    }
}

impl fmt::Display for ChefPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl AsRef<str> for ChefPath {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl From<&str> for ChefPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ChefPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
