//! A cookbook directory on disk, seen through its chefignore

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use repo_tree::{CookbookBundle, EntryKind, Error, Result};

use crate::chefignore::Chefignore;
use crate::io::{prune_empty_dirs, read_bytes, read_dir_sorted, write_atomic};

/// The visible file list is walked once and then kept for the lifetime of
/// the value.
#[derive(Debug)]
pub struct CookbookDir {
    dir: PathBuf,
    ignore: Chefignore,
    visible: OnceLock<Vec<String>>,
}

impl CookbookDir {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let ignore = Chefignore::for_cookbook(&dir)?;
        Ok(Self {
            dir,
            ignore,
            visible: OnceLock::new(),
        })
    }

    pub fn is_ignored(&self, relative: &str) -> bool {
        self.ignore.is_ignored(relative)
    }

    /// Every visible file, relative to the cookbook root, sorted.
    pub fn visible_files(&self) -> Result<&[String]> {
        if let Some(files) = self.visible.get() {
            return Ok(files);
        }
        let files = self.walk()?;
        Ok(self.visible.get_or_init(|| files))
    }

    fn walk(&self) -> Result<Vec<String>> {
        tracing::trace!(dir = %self.dir.display(), "walking cookbook");
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        let mut stack = vec![String::new()];
        while let Some(relative) = stack.pop() {
            let native = if relative.is_empty() {
                self.dir.clone()
            } else {
                self.dir.join(&relative)
            };
            for (name, is_dir) in read_dir_sorted(&native)? {
                let child = if relative.is_empty() {
                    name
                } else {
                    format!("{}/{}", relative, name)
                };
                if is_dir {
                    stack.push(child);
                } else if !self.ignore.is_ignored(&child) {
                    files.push(child);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// What `relative` is, or `None` if it is absent or hidden.
    ///
    /// A directory only exists while it holds at least one visible file.
    pub fn entry_kind(&self, relative: &str) -> Result<Option<EntryKind>> {
        let native = self.dir.join(relative);
        if native.is_file() {
            return Ok((!self.ignore.is_ignored(relative)).then_some(EntryKind::Leaf));
        }
        if native.is_dir() {
            let prefix = format!("{}/", relative);
            let visible = self
                .visible_files()?
                .iter()
                .any(|f| f.starts_with(&prefix));
            return Ok(visible.then_some(EntryKind::Container));
        }
        Ok(None)
    }

    /// Visible child names of `relative` (empty for the cookbook root).
    pub fn children(&self, relative: &str) -> Result<Vec<String>> {
        let prefix = if relative.is_empty() {
            String::new()
        } else {
            format!("{}/", relative)
        };
        let mut names: Vec<String> = self
            .visible_files()?
            .iter()
            .filter_map(|f| f.strip_prefix(&prefix))
            .map(|rest| rest.split('/').next().unwrap_or(rest).to_string())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    pub fn read_file(&self, relative: &str) -> Result<Vec<u8>> {
        read_bytes(&self.dir.join(relative))
    }

    pub fn read_bundle(&self, fallback_name: &str) -> Result<CookbookBundle> {
        let mut files = BTreeMap::new();
        for relative in self.visible_files()? {
            let content = self.read_file(relative)?;
            files.insert(relative.clone(), content);
        }
        Ok(CookbookBundle::from_files(fallback_name, files))
    }

    /// Make the visible files match `bundle`. Ignored files are left alone.
    ///
    /// Consumes the directory: its cached file list no longer holds afterwards.
    pub fn write_bundle(self, bundle: &CookbookBundle) -> Result<()> {
        let existing = self.visible_files()?.to_vec();
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        for (relative, content) in &bundle.files {
            write_atomic(&self.dir.join(relative), content)?;
        }
        for relative in existing {
            if !bundle.files.contains_key(&relative) {
                let native = self.dir.join(&relative);
                fs::remove_file(&native).map_err(|e| Error::io(&native, e))?;
            }
        }
        prune_empty_dirs(&self.dir)
    }
}
