//! chefignore files
//!
//! A cookbook uses its own `chefignore` when it has one, otherwise the one
//! in the directory that holds all cookbooks. Patterns are matched against
//! file paths relative to the cookbook root; `*` crosses `/`.

use std::path::Path;

use repo_tree::glob::Glob;
use repo_tree::{Error, Result};

pub const CHEFIGNORE: &str = "chefignore";

#[derive(Debug, Clone, Default)]
pub struct Chefignore {
    patterns: Vec<Glob>,
}

impl Chefignore {
    pub fn parse(text: &str) -> Result<Self> {
        let patterns = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(Glob::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Load the rules that apply to `cookbook_dir`.
    pub fn for_cookbook(cookbook_dir: &Path) -> Result<Self> {
        let own = cookbook_dir.join(CHEFIGNORE);
        let shared = cookbook_dir.parent().map(|p| p.join(CHEFIGNORE));
        let file = if own.is_file() {
            Some(own)
        } else {
            shared.filter(|p| p.is_file())
        };
        match file {
            Some(file) => {
                let text = std::fs::read_to_string(&file).map_err(|e| Error::io(&file, e))?;
                tracing::debug!(path = %file.display(), "loaded chefignore");
                Self::parse(&text)
            }
            None => Ok(Self::default()),
        }
    }

    /// Whether a file (path relative to the cookbook root) is ignored.
    pub fn is_ignored(&self, relative: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(relative))
    }
}
