//! Command context: configuration, repository root and trees
//!
//! The configuration file is found git-style by walking up from the
//! current directory, looking for `knife.toml` or `.chef/knife.toml`, with
//! `~/.chef/knife.toml` as the last resort. Command-line flags override
//! whatever the file says. Relative command-line paths are resolved against
//! the current directory's position inside the repository.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use repo_fs::LocalTree;
use repo_remote::{HttpRestApi, MemoryServer, RestApi, ServerTree};
use repo_tree::config::CONFIG_FILE;
use repo_tree::{Layout, PathPattern, RepoConfig};

use crate::cli::GlobalArgs;
use crate::error::{CliError, Result};

/// Everything a command needs to know about where it is running.
#[derive(Debug, Clone)]
pub struct Context {
    repo_root: PathBuf,
    server_url: Option<String>,
    layout: Layout,
    cwd: PathBuf,
}

impl Context {
    /// Resolve configuration for a command started in `cwd`.
    pub fn resolve(global: &GlobalArgs, cwd: &Path) -> Result<Self> {
        let config_path = match &global.config {
            Some(path) => Some(cwd.join(path)),
            None => find_config(cwd),
        };
        let mut config = match &config_path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                RepoConfig::load(path)?
            }
            None => RepoConfig::default(),
        };

        if let Some(url) = &global.server_url {
            config.chef_server_url = Some(url.clone());
        }
        if global.versioned_cookbooks {
            config.versioned_cookbooks = true;
        }
        if let Some(mode) = global.repo_mode {
            config.repo_mode = Some(mode);
        }

        let repo_root = global
            .repo
            .as_ref()
            .map(|repo| cwd.join(repo))
            .or_else(|| config.chef_repo_path.clone())
            .unwrap_or_else(|| cwd.to_path_buf());

        let context = Self {
            repo_root: canonical(&repo_root),
            server_url: config.chef_server_url.clone(),
            layout: config.layout(),
            cwd: canonical(cwd),
        };
        tracing::debug!(
            repo = %context.repo_root.display(),
            server = ?context.server_url,
            mode = %context.layout.mode,
            "resolved context"
        );
        Ok(context)
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn local_tree(&self) -> LocalTree {
        LocalTree::new(self.repo_root.clone(), self.layout)
    }

    /// The configured server as an object tree.
    pub fn server_tree(&self) -> Result<ServerTree> {
        let url = self.server_url.as_deref().ok_or_else(|| {
            CliError::config(
                "no server URL: set chef_server_url in knife.toml, pass --server-url or set KNIFE_SYNC_SERVER_URL",
            )
        })?;
        Ok(ServerTree::new(open_server(url, &self.cwd)?, self.layout))
    }

    /// Turn command-line arguments into namespace patterns.
    ///
    /// With no arguments the current directory is used.
    pub fn patterns(&self, args: &[String]) -> Result<Vec<PathPattern>> {
        if args.is_empty() {
            return Ok(vec![self.pattern(".")?]);
        }
        args.iter().map(|arg| self.pattern(arg)).collect()
    }

    fn pattern(&self, arg: &str) -> Result<PathPattern> {
        if arg.starts_with('/') {
            return Ok(PathPattern::new(arg));
        }
        let Ok(relative) = self.cwd.strip_prefix(&self.repo_root) else {
            return Err(CliError::user(format!(
                "Attempt to use relative path '{}' when current directory is outside the repository path ({})",
                arg,
                self.repo_root.display()
            )));
        };
        let prefix: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(PathPattern::new(format!("/{}/{}", prefix.join("/"), arg)))
    }
}

/// Nearest `knife.toml` or `.chef/knife.toml` at or above `start`, falling
/// back to `~/.chef/knife.toml`.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        for candidate in [dir.join(CONFIG_FILE), dir.join(".chef").join(CONFIG_FILE)] {
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".chef").join(CONFIG_FILE))
        .filter(|path| path.is_file())
}

/// Open a server by URL scheme.
fn open_server(url: &str, cwd: &Path) -> Result<Arc<dyn RestApi>> {
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(Arc::new(MemoryServer::open(cwd.join(path))?));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(Arc::new(HttpRestApi::new(url)));
    }
    Err(CliError::config(format!(
        "unsupported server URL '{}' (expected http://, https:// or file://)",
        url
    )))
}

fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
