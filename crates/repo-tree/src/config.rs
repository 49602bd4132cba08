//! `knife.toml` configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layout::{Layout, RepoMode};

pub const CONFIG_FILE: &str = "knife.toml";

/// Settings threaded through every command.
///
/// ```toml
/// chef_repo_path = "."
/// chef_server_url = "https://chef.example.com/organizations/acme"
/// versioned_cookbooks = false
/// repo_mode = "hosted_everything"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    /// Repository root, relative paths resolve against the config file
    pub chef_repo_path: Option<PathBuf>,
    pub chef_server_url: Option<String>,
    #[serde(default)]
    pub versioned_cookbooks: bool,
    pub repo_mode: Option<RepoMode>,
}

impl RepoConfig {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::ConfigParse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from a file. Relative `chef_repo_path` values are resolved
    /// against the file's directory, which is also the default repository
    /// unless it is a `.chef` directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut config = Self::from_toml_str(&text, path)?;
        let base = path.parent().unwrap_or(Path::new("."));
        config.chef_repo_path = Some(match config.chef_repo_path.take() {
            Some(repo) if repo.is_relative() => base.join(repo),
            Some(repo) => repo,
            // A config kept in `<repo>/.chef/` describes its parent directory
            None if base.file_name().is_some_and(|name| name == ".chef") => {
                base.parent().unwrap_or(base).to_path_buf()
            }
            None => base.to_path_buf(),
        });
        Ok(config)
    }

    /// The configured mode, or the one implied by the server URL.
    pub fn repo_mode(&self) -> RepoMode {
        self.repo_mode
            .unwrap_or_else(|| RepoMode::detect(self.chef_server_url.as_deref()))
    }

    pub fn layout(&self) -> Layout {
        Layout::new(self.repo_mode(), self.versioned_cookbooks)
    }
}
