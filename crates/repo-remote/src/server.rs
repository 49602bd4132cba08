//! The remote server backend
//!
//! Translates namespace operations into REST calls. Cookbooks are resolved
//! to a single version per directory and are only ever written whole.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value, json};

use repo_tree::cookbook::{checksum, parse_version, split_name_version};
use repo_tree::layout::{ACL_KINDS, COOKBOOK_SEGMENTS, DEFAULT_ENVIRONMENT};
use repo_tree::objects::{name_mismatch, normalize, split_policy_name};
use repo_tree::{
    ChefPath, Collection, Content, CookbookBundle, EntryKind, Error, FileRole, Layout, Location,
    ObjectKind, ObjectTree, Operation, Refusal, Result, Side, WriteOptions,
};

use crate::endpoints;
use crate::error::RestError;
use crate::rest::RestApi;

/// A cookbook version the server holds for a namespace directory.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedCookbook {
    collection: Collection,
    name: String,
    /// Version for cookbooks, identifier for cookbook artifacts
    version: String,
}

impl ResolvedCookbook {
    fn endpoint(&self) -> String {
        endpoints::cookbook_version(self.collection, &self.name, &self.version)
    }
}

/// A resolved cookbook version and its manifest.
struct CachedCookbook {
    cookbook: ResolvedCookbook,
    manifest: Value,
}

/// One file of a cookbook manifest.
struct ManifestFile {
    path: String,
    checksum: String,
}

/// A server seen as an object tree.
///
/// Cookbook resolution and manifests are fetched once per directory and
/// reused until the tree itself writes a cookbook.
pub struct ServerTree {
    api: Arc<dyn RestApi>,
    layout: Layout,
    cookbooks: Mutex<HashMap<ChefPath, Option<Arc<CachedCookbook>>>>,
}

impl ServerTree {
    pub fn new(api: Arc<dyn RestApi>, layout: Layout) -> Self {
        Self {
            api,
            layout,
            cookbooks: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, path: &ChefPath, endpoint: &str) -> Result<Option<Value>> {
        match self.api.get(endpoint) {
            Ok(value) => Ok(Some(value)),
            Err(RestError::NotFound) => Ok(None),
            Err(e) => Err(rest_error(path, Operation::Read, e)),
        }
    }

    /// Keys of a listing endpoint; a missing listing is empty.
    fn listing(&self, path: &ChefPath, endpoint: &str) -> Result<Vec<String>> {
        Ok(self
            .get(path, endpoint)?
            .as_ref()
            .and_then(Value::as_object)
            .map(|object| object.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Every name and its versions (or identifiers) in a cookbook collection.
    fn cookbook_listing(
        &self,
        path: &ChefPath,
        endpoint: &str,
        collection: Collection,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let key = version_key(collection);
        let listing = self.get(path, endpoint)?.unwrap_or(Value::Null);
        let mut result = BTreeMap::new();
        if let Some(object) = listing.as_object() {
            for (name, entry) in object {
                let versions = entry
                    .get("versions")
                    .and_then(Value::as_array)
                    .map(|versions| {
                        versions
                            .iter()
                            .filter_map(|v| v.get(key).and_then(Value::as_str))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                result.insert(name.clone(), versions);
            }
        }
        Ok(result)
    }

    fn resolve(
        &self,
        path: &ChefPath,
        collection: Collection,
        dir_name: &str,
    ) -> Result<Option<ResolvedCookbook>> {
        let (name, wanted) = match collection {
            Collection::CookbookArtifacts => match dir_name.rsplit_once('-') {
                Some((name, identifier)) if !name.is_empty() => (name, Some(identifier)),
                _ => return Ok(None),
            },
            _ if self.layout.versioned_cookbooks => match dir_name.rsplit_once('-') {
                Some((name, version)) if !name.is_empty() => (name, Some(version)),
                _ => return Ok(None),
            },
            _ => (dir_name, None),
        };

        let listing = self.cookbook_listing(
            path,
            &endpoints::cookbook_versions(collection, name),
            collection,
        )?;
        let Some(versions) = listing.get(name) else {
            return Ok(None);
        };

        let version = match (collection, wanted) {
            (Collection::CookbookArtifacts, Some(identifier)) => {
                versions.iter().find(|v| v.as_str() == identifier).cloned()
            }
            (_, Some(wanted)) => {
                let wanted = parse_version(wanted);
                versions
                    .iter()
                    .find(|v| wanted.is_some() && parse_version(v) == wanted)
                    .cloned()
            }
            (_, None) => versions
                .iter()
                .filter_map(|v| parse_version(v).map(|parsed| (parsed, v)))
                .max_by(|a, b| a.0.cmp(&b.0))
                .map(|(_, v)| v.clone()),
        };

        Ok(version.map(|version| ResolvedCookbook {
            collection,
            name: name.to_string(),
            version,
        }))
    }

    fn resolve_location(
        &self,
        path: &ChefPath,
        location: &Location,
    ) -> Result<Option<ResolvedCookbook>> {
        match location {
            Location::Cookbook {
                collection,
                dir_name,
            }
            | Location::CookbookEntry {
                collection,
                dir_name,
                ..
            } => self.resolve(path, *collection, dir_name),
            _ => Ok(None),
        }
    }

    /// The cookbook a directory (or a file inside it) stands for.
    fn cached_cookbook(
        &self,
        path: &ChefPath,
        location: &Location,
    ) -> Result<Option<Arc<CachedCookbook>>> {
        let Some(root) = location.cookbook_root() else {
            return Ok(None);
        };
        let cached = self.cache().get(&root).cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }
        let resolved = match self.resolve_location(path, location)? {
            Some(cookbook) => {
                tracing::debug!(%root, version = %cookbook.version, "fetching cookbook manifest");
                let manifest = self
                    .get(path, &cookbook.endpoint())?
                    .ok_or_else(|| Error::not_found(path))?;
                Some(Arc::new(CachedCookbook { cookbook, manifest }))
            }
            None => None,
        };
        self.cache().insert(root, resolved.clone());
        Ok(resolved)
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<ChefPath, Option<Arc<CachedCookbook>>>> {
        self.cookbooks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Writing one version can change what every directory resolves to.
    fn forget_cookbooks(&self) {
        self.cache().clear();
    }

    fn read_bundle(&self, path: &ChefPath, cached: &CachedCookbook) -> Result<CookbookBundle> {
        let mut files = BTreeMap::new();
        for file in manifest_files(&cached.manifest) {
            let content = self
                .api
                .get_bytes(&endpoints::file_store(&file.checksum))
                .map_err(|e| rest_error(path, Operation::Read, e))?;
            files.insert(file.path, content);
        }
        let mut bundle = CookbookBundle::from_files(&cached.cookbook.name, files);
        bundle.frozen = is_frozen(&cached.manifest);
        Ok(bundle)
    }

    /// Store every file, then the manifest.
    fn upload_cookbook(
        &self,
        path: &ChefPath,
        target: &ResolvedCookbook,
        bundle: &CookbookBundle,
        options: &WriteOptions,
        operation: Operation,
    ) -> Result<()> {
        tracing::debug!(%path, version = %target.version, "uploading cookbook");
        for content in bundle.files.values() {
            self.api
                .put_bytes(&endpoints::file_store(&checksum(content)), content)
                .map_err(|e| rest_error(path, operation, e))?;
        }

        let manifest = build_manifest(target, bundle, options.freeze);
        let mut endpoint = target.endpoint();
        if options.force {
            endpoint.push_str("?force=true");
        }
        let stored = self.api.put(&endpoint, &manifest);
        self.forget_cookbooks();
        match stored {
            Ok(_) => Ok(()),
            Err(RestError::Conflict(_)) if target.collection == Collection::Cookbooks => {
                Err(Error::refused(
                    path,
                    Refusal::Frozen {
                        cookbook: target.name.clone(),
                    },
                ))
            }
            Err(RestError::Conflict(_)) => Err(Error::refused(path, Refusal::AlreadyExists)),
            Err(e) => Err(rest_error(path, operation, e)),
        }
    }

    /// Where a bundle written to `dir_name` is stored on the server.
    fn upload_target(
        &self,
        collection: Collection,
        dir_name: &str,
        bundle: &CookbookBundle,
    ) -> ResolvedCookbook {
        let (name, version) = match collection {
            Collection::CookbookArtifacts => match dir_name.rsplit_once('-') {
                Some((name, identifier)) => (name.to_string(), identifier.to_string()),
                None => (dir_name.to_string(), String::new()),
            },
            _ if self.layout.versioned_cookbooks => match split_name_version(dir_name) {
                Some((name, version)) => (name.to_string(), version.to_string()),
                None => (dir_name.to_string(), bundle.version.to_string()),
            },
            _ => (dir_name.to_string(), bundle.version.to_string()),
        };
        ResolvedCookbook {
            collection,
            name,
            version,
        }
    }

    fn list_collection(&self, path: &ChefPath, collection: Collection) -> Result<Vec<String>> {
        let endpoint = endpoints::collection(collection);
        let mut names = match collection {
            Collection::Acls => {
                let mut names: Vec<String> = ACL_KINDS
                    .iter()
                    .filter(|kind| {
                        Collection::from_name(kind)
                            .is_some_and(|c| self.layout.mode.has_collection(c))
                    })
                    .map(|kind| kind.to_string())
                    .collect();
                names.push("organization.json".to_string());
                names
            }
            Collection::DataBags => self.listing(path, &endpoint)?,
            Collection::Cookbooks | Collection::CookbookArtifacts => {
                let listing = self.cookbook_listing(path, &endpoint, collection)?;
                let versioned = collection == Collection::CookbookArtifacts
                    || self.layout.versioned_cookbooks;
                if versioned {
                    listing
                        .iter()
                        .flat_map(|(name, versions)| {
                            versions.iter().map(move |v| format!("{}-{}", name, v))
                        })
                        .collect()
                } else {
                    listing
                        .into_iter()
                        .filter(|(_, versions)| !versions.is_empty())
                        .map(|(name, _)| name)
                        .collect()
                }
            }
            Collection::Policies => self
                .get(path, &endpoint)?
                .as_ref()
                .and_then(Value::as_object)
                .map(|policies| {
                    policies
                        .iter()
                        .flat_map(|(name, entry)| {
                            entry
                                .get("revisions")
                                .and_then(Value::as_object)
                                .into_iter()
                                .flat_map(|revisions| revisions.keys())
                                .map(move |revision| format!("{}-{}.json", name, revision))
                        })
                        .collect()
                })
                .unwrap_or_default(),
            _ => json_names(self.listing(path, &endpoint)?),
        };
        names.sort();
        Ok(names)
    }

    fn list_acl_dir(&self, path: &ChefPath, kind: &str) -> Result<Vec<String>> {
        let endpoint = endpoints::acl_kind(kind);
        let names = match kind {
            "cookbooks" => self
                .cookbook_listing(path, &endpoint, Collection::Cookbooks)?
                .into_keys()
                .collect(),
            "cookbook_artifacts" => self
                .cookbook_listing(path, &endpoint, Collection::CookbookArtifacts)?
                .into_keys()
                .collect(),
            _ => self.listing(path, &endpoint)?,
        };
        let mut names = json_names(names);
        names.sort();
        Ok(names)
    }

    fn create_document(
        &self,
        path: &ChefPath,
        kind: ObjectKind,
        name: &str,
        body: &Value,
    ) -> Result<()> {
        let result = match kind {
            ObjectKind::Policy => {
                let (policy, _) = split_policy_name(name);
                self.api.post(&endpoints::policy_revisions(policy), body)
            }
            ObjectKind::PolicyGroup => self
                .api
                .put(&format!("/policy_groups/{}", name), body),
            ObjectKind::DataBagItem => {
                let segments = path.segments();
                let bag = segments.get(1).copied().unwrap_or_default();
                self.api.post(&endpoints::data_bag(bag), body)
            }
            other => match endpoints::document_collection(other) {
                Some(collection) => self.api.post(collection, body),
                None => {
                    return Err(Error::refused(
                        path,
                        Refusal::Protected {
                            operation: Operation::CreateChild,
                        },
                    ));
                }
            },
        };
        match result {
            Ok(_) => Ok(()),
            Err(RestError::Conflict(_)) => Err(Error::refused(path, Refusal::AlreadyExists)),
            Err(e) => Err(rest_error(path, Operation::CreateChild, e)),
        }
    }

    fn update_acl(&self, path: &ChefPath, endpoint: &str, acl: &Value) -> Result<()> {
        let Some(permissions) = acl.as_object() else {
            return Err(Error::failed(path, Operation::Update, "ACL must be a JSON object"));
        };
        for (permission, ace) in permissions {
            let mut body = Map::new();
            body.insert(permission.clone(), ace.clone());
            self.api
                .put(&format!("{}/{}", endpoint, permission), &Value::Object(body))
                .map_err(|e| rest_error(path, Operation::Update, e))?;
        }
        Ok(())
    }

    /// Add missing members and remove extra ones.
    fn update_members(&self, path: &ChefPath, desired: &Value) -> Result<()> {
        let desired = member_names(ObjectKind::Members, desired);
        let current = match self.get(path, "/members")? {
            Some(value) => member_names(ObjectKind::Members, &value),
            None => Vec::new(),
        };
        for user in desired.iter().filter(|u| !current.contains(u)) {
            match self.api.post("/members", &json!({ "username": user })) {
                Ok(_) => {}
                Err(RestError::Conflict(_)) => {
                    tracing::warn!("User {} is already a member of the organization", user);
                }
                Err(e) => return Err(rest_error(path, Operation::Update, e)),
            }
        }
        for user in current.iter().filter(|u| !desired.contains(u)) {
            self.api
                .delete(&format!("/members/{}", user))
                .map_err(|e| rest_error(path, Operation::Update, e))?;
        }
        Ok(())
    }

    /// Invite missing users and withdraw invitations for extra ones.
    fn update_invitations(&self, path: &ChefPath, desired: &Value) -> Result<()> {
        let desired = member_names(ObjectKind::Invitations, desired);
        let current: Vec<(String, String)> = self
            .get(path, "/association_requests")?
            .as_ref()
            .and_then(Value::as_array)
            .map(|requests| {
                requests
                    .iter()
                    .filter_map(|request| {
                        let id = request.get("id")?.as_str()?;
                        let user = request.get("username")?.as_str()?;
                        Some((id.to_string(), user.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        for user in &desired {
            if current.iter().any(|(_, u)| u == user) {
                continue;
            }
            match self.api.post("/association_requests", &json!({ "user": user })) {
                Ok(_) => {}
                Err(RestError::Conflict(_)) => {
                    tracing::warn!("User {} has already been invited", user);
                }
                Err(e) => return Err(rest_error(path, Operation::Update, e)),
            }
        }
        for (id, user) in &current {
            if !desired.contains(user) {
                self.api
                    .delete(&format!("/association_requests/{}", id))
                    .map_err(|e| rest_error(path, Operation::Update, e))?;
            }
        }
        Ok(())
    }
}

impl ObjectTree for ServerTree {
    fn side(&self) -> Side {
        Side::Remote
    }

    fn kind(&self, path: &ChefPath) -> Result<Option<EntryKind>> {
        let location = self.layout.locate(path);
        let kind = match &location {
            Location::Invalid => None,
            Location::Root | Location::Collection(_) | Location::AclDir { .. } => {
                Some(EntryKind::Container)
            }
            Location::Singleton(_) => Some(EntryKind::Leaf),
            Location::DataBag { bag } => self
                .get(path, &endpoints::data_bag(bag))?
                .map(|_| EntryKind::Container),
            Location::Object { .. } => match endpoints::document(path, &location) {
                Some(endpoint) => self.get(path, &endpoint)?.map(|_| EntryKind::Leaf),
                None => None,
            },
            Location::Cookbook { .. } => self
                .cached_cookbook(path, &location)?
                .map(|_| EntryKind::Container),
            Location::CookbookEntry { relative, .. } => {
                match self.cached_cookbook(path, &location)? {
                    Some(cached) => entry_kind(&manifest_files(&cached.manifest), relative),
                    None => None,
                }
            }
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
        match &location {
            Location::Root => Ok(self.layout.mode.root_children()),
            Location::Collection(collection) => self.list_collection(path, *collection),
            Location::DataBag { bag } => {
                let mut names = json_names(self.listing(path, &endpoints::data_bag(bag))?);
                names.sort();
                Ok(names)
            }
            Location::AclDir { kind } => self.list_acl_dir(path, kind),
            Location::Cookbook { .. } | Location::CookbookEntry { .. } => {
                let Some(cached) = self.cached_cookbook(path, &location)? else {
                    return Err(Error::not_found(path));
                };
                let relative = match &location {
                    Location::CookbookEntry { relative, .. } => relative.as_str(),
                    _ => "",
                };
                Ok(children(&manifest_files(&cached.manifest), relative))
            }
            _ => Err(Error::refused(path, Refusal::NotADirectory)),
        }
    }

    fn read(&self, path: &ChefPath) -> Result<Content> {
        let location = self.layout.locate(path);
        match &location {
            Location::Object { .. } | Location::Singleton(_) => {
                let endpoint =
                    endpoints::document(path, &location).ok_or_else(|| Error::not_found(path))?;
                tracing::debug!(%path, endpoint = %endpoint, "reading remote document");
                self.get(path, &endpoint)?
                    .map(Content::Json)
                    .ok_or_else(|| Error::not_found(path))
            }
            Location::Cookbook { .. } => {
                let cached = self
                    .cached_cookbook(path, &location)?
                    .ok_or_else(|| Error::not_found(path))?;
                Ok(Content::Cookbook(self.read_bundle(path, &cached)?))
            }
            Location::CookbookEntry { relative, .. } => {
                let cached = self
                    .cached_cookbook(path, &location)?
                    .ok_or_else(|| Error::not_found(path))?;
                let files = manifest_files(&cached.manifest);
                match files.iter().find(|f| &f.path == relative) {
                    Some(file) => self
                        .api
                        .get_bytes(&endpoints::file_store(&file.checksum))
                        .map(Content::Raw)
                        .map_err(|e| rest_error(path, Operation::Read, e)),
                    None if entry_kind(&files, relative).is_some() => {
                        Err(Error::failed(path, Operation::Read, "is a directory"))
                    }
                    None => Err(Error::not_found(path)),
                }
            }
            Location::Invalid => Err(Error::not_found(path)),
            _ => match self.kind(path)? {
                Some(_) => Err(Error::failed(path, Operation::Read, "is a directory")),
                None => Err(Error::not_found(path)),
            },
        }
    }

    fn create_child(
        &self,
        parent: &ChefPath,
        name: &str,
        content: Option<&Content>,
        options: &WriteOptions,
    ) -> Result<()> {
        let path = parent.join(name);
        if !self.is_container(parent)? {
            return Err(Error::not_found(parent));
        }
        if self.exists(&path)? {
            return Err(Error::refused(&path, Refusal::AlreadyExists));
        }
        let protected = || {
            Error::refused(
                parent,
                Refusal::Protected {
                    operation: Operation::CreateChild,
                },
            )
        };

        let location = self.layout.locate(&path);
        tracing::debug!(%path, "creating remote entry");
        match (&location, content) {
            (
                Location::Object {
                    kind: ObjectKind::Acl,
                    ..
                },
                _,
            ) => Err(protected()),
            (Location::Object { kind, name }, Some(Content::Json(value))) => {
                if let Some((expected, actual)) = name_mismatch(*kind, name, value) {
                    return Err(Error::refused(
                        &path,
                        Refusal::NameMismatch {
                            operation: Operation::CreateChild,
                            expected,
                            actual,
                        },
                    ));
                }
                let body = normalize(*kind, name, value);
                self.create_document(&path, *kind, name, &body)
            }
            (Location::Object { .. }, Some(Content::Unparsed { error, .. })) => Err(
                Error::refused(
                    &path,
                    Refusal::Parse {
                        operation: Operation::CreateChild,
                        message: error.clone(),
                    },
                ),
            ),
            (Location::DataBag { bag }, None) => {
                match self.api.post("/data", &json!({ "name": bag })) {
                    Ok(_) => Ok(()),
                    Err(RestError::Conflict(_)) => {
                        Err(Error::refused(&path, Refusal::AlreadyExists))
                    }
                    Err(e) => Err(rest_error(&path, Operation::CreateChild, e)),
                }
            }
            (
                Location::Cookbook {
                    collection,
                    dir_name,
                },
                Some(Content::Cookbook(bundle)),
            ) => {
                let target = self.upload_target(*collection, dir_name, bundle);
                self.upload_cookbook(&path, &target, bundle, options, Operation::CreateChild)
            }
            _ => Err(protected()),
        }
    }

    fn update(&self, path: &ChefPath, content: &Content, options: &WriteOptions) -> Result<()> {
        let location = self.layout.locate(path);
        let protected = || {
            Error::refused(
                path,
                Refusal::Protected {
                    operation: Operation::Update,
                },
            )
        };
        if location.is_system() {
            return Err(protected());
        }
        if path.as_str() == DEFAULT_ENVIRONMENT {
            return Err(Error::refused(
                path,
                Refusal::DefaultEnvironment {
                    operation: Operation::Update,
                },
            ));
        }

        match (&location, content) {
            (Location::Object { kind, .. }, _) if kind.is_immutable() => Err(Error::refused(
                path,
                Refusal::Immutable {
                    kind: kind.plural().to_string(),
                },
            )),
            (
                Location::Cookbook {
                    collection: Collection::CookbookArtifacts,
                    ..
                },
                _,
            ) => Err(Error::refused(
                path,
                Refusal::Immutable {
                    kind: "cookbook artifacts".to_string(),
                },
            )),
            (Location::Object { .. } | Location::Singleton(_), Content::Unparsed { error, .. }) => {
                Err(Error::refused(
                    path,
                    Refusal::Parse {
                        operation: Operation::Update,
                        message: error.clone(),
                    },
                ))
            }
            (Location::Object { kind, name }, Content::Json(value)) => {
                if !self.exists(path)? {
                    return Err(Error::not_found(path));
                }
                if let Some((expected, actual)) = name_mismatch(*kind, name, value) {
                    return Err(Error::refused(
                        path,
                        Refusal::NameMismatch {
                            operation: Operation::Update,
                            expected,
                            actual,
                        },
                    ));
                }
                let endpoint =
                    endpoints::document(path, &location).ok_or_else(|| Error::not_found(path))?;
                let body = normalize(*kind, name, value);
                tracing::debug!(%path, endpoint = %endpoint, "updating remote document");
                if *kind == ObjectKind::Acl {
                    return self.update_acl(path, &endpoint, &body);
                }
                self.api
                    .put(&endpoint, &body)
                    .map(|_| ())
                    .map_err(|e| rest_error(path, Operation::Update, e))
            }
            (Location::Singleton(ObjectKind::Members), Content::Json(value)) => {
                self.update_members(path, value)
            }
            (Location::Singleton(ObjectKind::Invitations), Content::Json(value)) => {
                self.update_invitations(path, value)
            }
            (Location::Singleton(kind), Content::Json(value)) => {
                let body = normalize(*kind, "", value);
                self.api
                    .put("/organization", &body)
                    .map(|_| ())
                    .map_err(|e| rest_error(path, Operation::Update, e))
            }
            (
                Location::Cookbook {
                    collection,
                    dir_name,
                },
                Content::Cookbook(bundle),
            ) => {
                if self.cached_cookbook(path, &location)?.is_none() {
                    return Err(Error::not_found(path));
                }
                let target = self.upload_target(*collection, dir_name, bundle);
                let existing = self.get(path, &target.endpoint())?;
                if existing.as_ref().is_some_and(is_frozen) && !options.force {
                    return Err(Error::refused(
                        path,
                        Refusal::Frozen {
                            cookbook: target.name.clone(),
                        },
                    ));
                }
                self.upload_cookbook(path, &target, bundle, options, Operation::Update)
            }
            (Location::CookbookEntry { .. }, _) => {
                if !self.exists(path)? {
                    return Err(Error::not_found(path));
                }
                Err(protected())
            }
            (Location::Object { .. } | Location::Singleton(_), _) => Err(Error::failed(
                path,
                Operation::Update,
                "expected a JSON document",
            )),
            _ => Err(protected()),
        }
    }

    fn delete(&self, path: &ChefPath, recursive: bool) -> Result<()> {
        let location = self.layout.locate(path);
        let protected = || {
            Error::refused(
                path,
                Refusal::Protected {
                    operation: Operation::Delete,
                },
            )
        };
        if location.is_system() {
            return Err(protected());
        }
        if path.as_str() == DEFAULT_ENVIRONMENT {
            return Err(Error::refused(
                path,
                Refusal::DefaultEnvironment {
                    operation: Operation::Delete,
                },
            ));
        }

        tracing::debug!(%path, recursive, "deleting remote entry");
        match &location {
            Location::Invalid => Err(Error::not_found(path)),
            Location::Singleton(_)
            | Location::AclDir { .. }
            | Location::Object {
                kind: ObjectKind::Acl,
                ..
            } => Err(protected()),
            Location::Object { .. } => {
                let endpoint =
                    endpoints::document(path, &location).ok_or_else(|| Error::not_found(path))?;
                self.api
                    .delete(&endpoint)
                    .map(|_| ())
                    .map_err(|e| rest_error(path, Operation::Delete, e))
            }
            Location::DataBag { bag } => {
                if !self.exists(path)? {
                    return Err(Error::not_found(path));
                }
                if !recursive && !self.list(path)?.is_empty() {
                    return Err(Error::refused(path, Refusal::MustRecurse));
                }
                self.api
                    .delete(&endpoints::data_bag(bag))
                    .map(|_| ())
                    .map_err(|e| rest_error(path, Operation::Delete, e))
            }
            Location::Cookbook { .. } => {
                let cached = self
                    .cached_cookbook(path, &location)?
                    .ok_or_else(|| Error::not_found(path))?;
                if !recursive {
                    return Err(Error::refused(path, Refusal::MustRecurse));
                }
                let deleted = self.api.delete(&cached.cookbook.endpoint());
                self.forget_cookbooks();
                deleted
                    .map(|_| ())
                    .map_err(|e| rest_error(path, Operation::Delete, e))
            }
            Location::CookbookEntry { .. } => {
                if !self.exists(path)? {
                    return Err(Error::not_found(path));
                }
                Err(protected())
            }
            Location::Root | Location::Collection(_) => Err(protected()),
        }
    }

    fn can_have_child(&self, parent: &ChefPath, name: &str, is_container: bool) -> bool {
        if !self.layout.accepts_child(parent, name, is_container) {
            return false;
        }
        match self.layout.locate(&parent.join(name)) {
            Location::CookbookEntry { relative, .. } if !relative.contains('/') => {
                !is_container || COOKBOOK_SEGMENTS.contains(&relative.as_str())
            }
            _ => true,
        }
    }

    fn copies_as_unit(&self, path: &ChefPath) -> bool {
        matches!(self.layout.locate(path), Location::Cookbook { .. })
    }
}

fn rest_error(path: &ChefPath, operation: Operation, error: RestError) -> Error {
    match error {
        RestError::NotFound => Error::not_found(path),
        other => Error::failed(path, operation, other.to_string()),
    }
}

fn version_key(collection: Collection) -> &'static str {
    match collection {
        Collection::CookbookArtifacts => "identifier",
        _ => "version",
    }
}

fn json_names(names: Vec<String>) -> Vec<String> {
    names.into_iter().map(|n| format!("{}.json", n)).collect()
}

fn member_names(kind: ObjectKind, value: &Value) -> Vec<String> {
    normalize(kind, "", value)
        .as_array()
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn is_frozen(manifest: &Value) -> bool {
    manifest
        .get("frozen?")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn manifest_files(manifest: &Value) -> Vec<ManifestFile> {
    manifest
        .get("all_files")
        .and_then(Value::as_array)
        .map(|files| {
            files
                .iter()
                .filter_map(|file| {
                    Some(ManifestFile {
                        path: file.get("path")?.as_str()?.to_string(),
                        checksum: file.get("checksum")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn entry_kind(files: &[ManifestFile], relative: &str) -> Option<EntryKind> {
    if files.iter().any(|f| f.path == relative) {
        return Some(EntryKind::Leaf);
    }
    let prefix = format!("{}/", relative);
    files
        .iter()
        .any(|f| f.path.starts_with(&prefix))
        .then_some(EntryKind::Container)
}

fn children(files: &[ManifestFile], relative: &str) -> Vec<String> {
    let prefix = if relative.is_empty() {
        String::new()
    } else {
        format!("{}/", relative)
    };
    let mut names: Vec<String> = files
        .iter()
        .filter_map(|f| f.path.strip_prefix(&prefix))
        .map(|rest| rest.split('/').next().unwrap_or(rest).to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}

fn build_manifest(target: &ResolvedCookbook, bundle: &CookbookBundle, freeze: bool) -> Value {
    let all_files: Vec<Value> = bundle
        .files
        .iter()
        .map(|(relative, content)| {
            let file_name = relative.rsplit('/').next().unwrap_or(relative);
            json!({
                "name": format!("{}/{}", FileRole::classify(relative).section(), file_name),
                "path": relative,
                "checksum": checksum(content),
                "specificity": "default",
            })
        })
        .collect();
    let dependencies: Map<String, Value> = bundle
        .metadata()
        .depends
        .into_iter()
        .map(|dep| (dep, json!(">= 0.0.0")))
        .collect();

    let mut manifest = json!({
        "cookbook_name": target.name,
        "name": format!("{}-{}", target.name, target.version),
        "version": bundle.version.to_string(),
        "frozen?": freeze,
        "all_files": all_files,
        "metadata": {
            "name": bundle.name,
            "version": bundle.version.to_string(),
            "dependencies": dependencies,
        },
    });
    if target.collection == Collection::CookbookArtifacts
        && let Some(object) = manifest.as_object_mut()
    {
        object.insert("identifier".to_string(), json!(target.version));
    }
    manifest
}
