//! The local repository backend

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use repo_tree::cookbook::split_name_version;
use repo_tree::entry::pretty_json;
use repo_tree::objects::{minimize, name_mismatch};
use repo_tree::{
    ChefPath, Content, EntryKind, Error, Layout, Location, ObjectKind, ObjectTree, Operation,
    Refusal, Result, Side, WriteOptions,
};

use crate::cookbook_dir::CookbookDir;
use crate::io::{read_bytes, read_dir_sorted, write_atomic};

/// A repository checked out on disk.
///
/// `/roles/web.json` maps to `<root>/roles/web.json`. Cookbook directories
/// are filtered through their chefignore rules.
///
/// Each cookbook directory is opened and walked once per tree; writes through
/// the tree drop those snapshots, changes made behind its back are not seen.
#[derive(Debug)]
pub struct LocalTree {
    root: PathBuf,
    layout: Layout,
    cookbooks: Mutex<HashMap<ChefPath, Arc<CookbookDir>>>,
}

impl LocalTree {
    pub fn new(root: impl Into<PathBuf>, layout: Layout) -> Self {
        let root = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self {
            root,
            layout,
            cookbooks: Mutex::new(HashMap::new()),
        }
    }

    /// Filesystem location of a namespace path.
    pub fn native(&self, path: &ChefPath) -> PathBuf {
        path.segments()
            .iter()
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    fn cookbook_dir(&self, location: &Location) -> Result<Option<(Arc<CookbookDir>, String)>> {
        let Some(root) = location.cookbook_root() else {
            return Ok(None);
        };
        let relative = match location {
            Location::CookbookEntry { relative, .. } => relative.clone(),
            _ => String::new(),
        };
        let cached = self.cache().get(&root).cloned();
        let dir = match cached {
            Some(dir) => dir,
            None => {
                let dir = Arc::new(CookbookDir::open(self.native(&root))?);
                self.cache().insert(root, dir.clone());
                dir
            }
        };
        Ok(Some((dir, relative)))
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<ChefPath, Arc<CookbookDir>>> {
        self.cookbooks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop cookbook snapshots after the tree changed the disk.
    fn forget_cookbooks(&self) {
        self.cache().clear();
    }

    /// The cookbook name a directory stands for.
    fn cookbook_name<'a>(&self, location: &'a Location) -> &'a str {
        match location {
            Location::Cookbook {
                collection,
                dir_name,
            } => {
                let versioned = self.layout.versioned_cookbooks
                    || *collection == repo_tree::Collection::CookbookArtifacts;
                if versioned {
                    split_name_version(dir_name)
                        .map(|(name, _)| name)
                        .or_else(|| dir_name.rsplit_once('-').map(|(name, _)| name))
                        .unwrap_or(dir_name.as_str())
                } else {
                    dir_name.as_str()
                }
            }
            _ => "",
        }
    }

    fn write_content(
        &self,
        path: &ChefPath,
        content: &Content,
        operation: Operation,
    ) -> Result<()> {
        let location = self.layout.locate(path);
        let native = self.native(path);
        let written = match (&location, content) {
            (Location::Object { kind, name }, Content::Json(value)) => {
                self.write_object(path, *kind, name, value, operation)
            }
            (Location::Singleton(kind), Content::Json(value)) => {
                let name = path.name().and_then(|n| n.strip_suffix(".json")).unwrap_or("");
                self.write_object(path, *kind, name, value, operation)
            }
            (Location::Cookbook { .. }, Content::Cookbook(bundle)) => {
                CookbookDir::open(&native)?.write_bundle(bundle)
            }
            (_, Content::Cookbook(_)) => Err(Error::failed(
                path,
                operation,
                "a cookbook can only be written to a cookbook directory",
            )),
            (_, Content::Json(value)) => write_atomic(&native, pretty_json(value).as_bytes()),
            (_, Content::Raw(bytes)) | (_, Content::Unparsed { bytes, .. }) => {
                write_atomic(&native, bytes)
            }
        };
        self.forget_cookbooks();
        written
    }

    fn write_object(
        &self,
        path: &ChefPath,
        kind: ObjectKind,
        name: &str,
        value: &serde_json::Value,
        operation: Operation,
    ) -> Result<()> {
        if let Some((expected, actual)) = name_mismatch(kind, name, value) {
            return Err(Error::refused(
                path,
                Refusal::NameMismatch {
                    operation,
                    expected,
                    actual,
                },
            ));
        }
        let minimized = minimize(kind, name, value);
        write_atomic(&self.native(path), pretty_json(&minimized).as_bytes())
    }
}

impl ObjectTree for LocalTree {
    fn side(&self) -> Side {
        Side::Local
    }

    fn kind(&self, path: &ChefPath) -> Result<Option<EntryKind>> {
        let location = self.layout.locate(path);
        let native = self.native(path);
        let kind = match &location {
            Location::Invalid => None,
            Location::Root
            | Location::Collection(_)
            | Location::DataBag { .. }
            | Location::AclDir { .. } => native.is_dir().then_some(EntryKind::Container),
            Location::Singleton(_) | Location::Object { .. } => {
                native.is_file().then_some(EntryKind::Leaf)
            }
            Location::Cookbook { .. } => match self.cookbook_dir(&location)? {
                Some((dir, _)) if native.is_dir() => {
                    (!dir.visible_files()?.is_empty()).then_some(EntryKind::Container)
                }
                _ => None,
            },
            Location::CookbookEntry { .. } => match self.cookbook_dir(&location)? {
                Some((dir, relative)) => dir.entry_kind(&relative)?,
                None => None,
            },
        };
        Ok(kind)
    }

    fn list(&self, path: &ChefPath) -> Result<Vec<String>> {
        match self.kind(path)? {
            None => return Err(Error::not_found(path)),
            Some(EntryKind::Leaf) => return Err(Error::refused(path, Refusal::NotADirectory)),
            Some(EntryKind::Container) => {}
        }

        let location = self.layout.locate(path);
        if let Some((dir, relative)) = self.cookbook_dir(&location)? {
            return dir.children(&relative);
        }

        let mut names = Vec::new();
        for (name, is_dir) in read_dir_sorted(&self.native(path))? {
            if !self.layout.accepts_child(path, &name, is_dir) {
                continue;
            }
            if let Location::Collection(collection) = &location
                && collection.holds_cookbooks()
            {
                let child = path.join(&name);
                if self.kind(&child)?.is_none() {
                    tracing::warn!(
                        "Cookbook '{}' is empty or entirely chefignored at {}",
                        name,
                        self.native(&child).display()
                    );
                    continue;
                }
            }
            names.push(name);
        }
        Ok(names)
    }

    fn read(&self, path: &ChefPath) -> Result<Content> {
        let location = self.layout.locate(path);
        match self.kind(path)? {
            None => Err(Error::not_found(path)),
            Some(EntryKind::Leaf) => {
                let bytes = read_bytes(&self.native(path))?;
                match location {
                    Location::Object { .. } | Location::Singleton(_) => {
                        Ok(Content::from_json_bytes(bytes))
                    }
                    _ => Ok(Content::Raw(bytes)),
                }
            }
            Some(EntryKind::Container) => match self.cookbook_dir(&location)? {
                Some((dir, _)) if matches!(location, Location::Cookbook { .. }) => {
                    let bundle = dir.read_bundle(self.cookbook_name(&location))?;
                    Ok(Content::Cookbook(bundle))
                }
                _ => Err(Error::failed(path, Operation::Read, "is a directory")),
            },
        }
    }

    fn create_child(
        &self,
        parent: &ChefPath,
        name: &str,
        content: Option<&Content>,
        _options: &WriteOptions,
    ) -> Result<()> {
        let path = parent.join(name);
        // A freshly created cookbook directory has no visible files yet
        if !self.native(parent).is_dir() {
            return Err(Error::not_found(parent));
        }
        if self.exists(&path)? {
            return Err(Error::refused(&path, Refusal::AlreadyExists));
        }
        let is_container = matches!(content, None | Some(Content::Cookbook(_)));
        if !self.can_have_child(parent, name, is_container) {
            return Err(Error::refused(
                parent,
                Refusal::Protected {
                    operation: Operation::CreateChild,
                },
            ));
        }

        tracing::debug!(%path, "creating local entry");
        match content {
            None => {
                let native = self.native(&path);
                fs::create_dir_all(&native).map_err(|e| Error::io(&native, e))?;
                self.forget_cookbooks();
                Ok(())
            }
            Some(content) => self.write_content(&path, content, Operation::CreateChild),
        }
    }

    fn update(&self, path: &ChefPath, content: &Content, _options: &WriteOptions) -> Result<()> {
        let location = self.layout.locate(path);
        if location.is_system() {
            return Err(Error::refused(
                path,
                Refusal::Protected {
                    operation: Operation::Update,
                },
            ));
        }
        match self.kind(path)? {
            None => Err(Error::not_found(path)),
            Some(EntryKind::Container) if !matches!(location, Location::Cookbook { .. }) => {
                Err(Error::refused(
                    path,
                    Refusal::Protected {
                        operation: Operation::Update,
                    },
                ))
            }
            Some(_) => {
                tracing::debug!(%path, "updating local entry");
                self.write_content(path, content, Operation::Update)
            }
        }
    }

    fn delete(&self, path: &ChefPath, recursive: bool) -> Result<()> {
        if self.layout.locate(path).is_system() {
            return Err(Error::refused(
                path,
                Refusal::Protected {
                    operation: Operation::Delete,
                },
            ));
        }
        let native = self.native(path);
        match self.kind(path)? {
            None => return Err(Error::not_found(path)),
            Some(EntryKind::Leaf) => {
                fs::remove_file(&native).map_err(|e| Error::io(&native, e))?;
            }
            Some(EntryKind::Container) => {
                if !recursive && !self.list(path)?.is_empty() {
                    return Err(Error::refused(path, Refusal::MustRecurse));
                }
                tracing::debug!(%path, "removing local directory");
                fs::remove_dir_all(&native).map_err(|e| Error::io(&native, e))?;
            }
        }
        self.forget_cookbooks();
        Ok(())
    }

    fn can_have_child(&self, parent: &ChefPath, name: &str, is_container: bool) -> bool {
        if !self.layout.accepts_child(parent, name, is_container) {
            return false;
        }
        if is_container {
            return true;
        }
        let location = self.layout.locate(&parent.join(name));
        match self.cookbook_dir(&location) {
            Ok(Some((dir, relative))) => relative.is_empty() || !dir.is_ignored(&relative),
            Ok(None) => true,
            Err(_) => false,
        }
    }

    fn display_path(&self, path: &ChefPath) -> String {
        self.native(path).display().to_string()
    }
}
