//! An in-process server speaking the same REST shapes as a real one
//!
//! Used by the test suites and for offline work: `file://state.json` server
//! URLs open a `MemoryServer` persisted to that file after every mutation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{RestError, Result};
use crate::rest::RestApi;

/// Collections of plain JSON documents addressed as `/<kind>/<name>`.
const DOCUMENT_KINDS: &[&str] = &[
    "clients",
    "containers",
    "environments",
    "groups",
    "nodes",
    "policy_groups",
    "roles",
    "users",
];

const PERMISSIONS: &[&str] = &["create", "read", "update", "delete", "grant"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Put,
    Post,
    Delete,
}

type Versions = BTreeMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct State {
    /// kind → name → document
    objects: BTreeMap<String, BTreeMap<String, Value>>,
    /// bag → item → document
    data_bags: BTreeMap<String, BTreeMap<String, Value>>,
    /// name → version → manifest
    cookbooks: Versions,
    /// name → identifier → manifest
    cookbook_artifacts: Versions,
    /// name → revision → document
    policies: Versions,
    /// checksum → file content
    file_store: BTreeMap<String, Vec<u8>>,
    /// REST path of the object → ACL, for ACLs that were changed
    acls: BTreeMap<String, Value>,
    organization: Map<String, Value>,
    members: BTreeSet<String>,
    invitations: BTreeSet<String>,
}

/// A thread-safe in-memory server.
pub struct MemoryServer {
    state: Mutex<State>,
    storage: Option<PathBuf>,
}

impl MemoryServer {
    /// A fresh server holding only the `_default` environment.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::seeded()),
            storage: None,
        }
    }

    /// Open a server backed by a JSON state file, creating it on first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.is_file() {
            let text = std::fs::read_to_string(&path).map_err(|e| storage_error(&path, e))?;
            serde_json::from_str(&text).map_err(|e| storage_error(&path, e))?
        } else {
            State::seeded()
        };
        tracing::debug!(path = %path.display(), "opened memory server");
        Ok(Self {
            state: Mutex::new(state),
            storage: Some(path),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn handle(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        tracing::debug!(?method, path, "memory server request");
        let (route, query) = path.split_once('?').unwrap_or((path, ""));
        let segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();
        let force = query.split('&').any(|pair| pair == "force=true");

        let mut state = self.lock();
        let response = state.dispatch(method, &segments, body, force)?;
        if method != Method::Get {
            self.persist(&state)?;
        }
        Ok(response)
    }

    fn persist(&self, state: &State) -> Result<()> {
        let Some(path) = &self.storage else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(state).map_err(|e| storage_error(path, e))?;
        repo_fs::io::write_atomic(path, &bytes).map_err(|e| storage_error(path, e))
    }
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl RestApi for MemoryServer {
    fn get(&self, path: &str) -> Result<Value> {
        self.handle(Method::Get, path, None)
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.handle(Method::Put, path, Some(body))
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.handle(Method::Post, path, Some(body))
    }

    fn delete(&self, path: &str) -> Result<Value> {
        self.handle(Method::Delete, path, None)
    }

    fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let checksum = file_store_key(path)?;
        self.lock()
            .file_store
            .get(checksum)
            .cloned()
            .ok_or(RestError::NotFound)
    }

    fn put_bytes(&self, path: &str, body: &[u8]) -> Result<()> {
        let checksum = file_store_key(path)?.to_string();
        let mut state = self.lock();
        state.file_store.insert(checksum, body.to_vec());
        self.persist(&state)
    }
}

impl State {
    fn seeded() -> Self {
        let mut state = Self::default();
        state.objects.entry("environments".to_string()).or_default().insert(
            "_default".to_string(),
            json!({
                "name": "_default",
                "description": "The default Chef environment",
                "json_class": "Chef::Environment",
                "chef_type": "environment",
                "cookbook_versions": {},
                "default_attributes": {},
                "override_attributes": {},
            }),
        );
        state
    }

    fn dispatch(
        &mut self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
        force: bool,
    ) -> Result<Value> {
        use Method::*;

        if let Some(position) = segments.iter().position(|s| *s == "_acl") {
            return self.acl(
                method,
                &segments[..position],
                segments.get(position + 1).copied(),
                body,
            );
        }

        match (method, segments) {
            (Get, ["organization"]) => Ok(Value::Object(self.organization.clone())),
            (Put, ["organization"]) => {
                let body = require_body(body)?;
                self.organization = body.as_object().cloned().unwrap_or_default();
                Ok(body.clone())
            }

            (Get, ["members"]) => Ok(Value::Array(
                self.members
                    .iter()
                    .map(|user| json!({ "user": { "username": user } }))
                    .collect(),
            )),
            (Post, ["members"]) => {
                let user = field(require_body(body)?, "username")?.to_string();
                if !self.members.insert(user.clone()) {
                    return Err(RestError::Conflict(format!(
                        "User {} is already a member",
                        user
                    )));
                }
                Ok(json!({ "username": user }))
            }
            (Delete, ["members", user]) => {
                if !self.members.remove(*user) {
                    return Err(RestError::NotFound);
                }
                Ok(json!({ "username": user }))
            }

            (Get, ["association_requests"]) => Ok(Value::Array(
                self.invitations
                    .iter()
                    .map(|user| json!({ "id": invitation_id(user), "username": user }))
                    .collect(),
            )),
            (Post, ["association_requests"]) => {
                let user = field(require_body(body)?, "user")?.to_string();
                if !self.invitations.insert(user.clone()) {
                    return Err(RestError::Conflict(format!(
                        "User {} has already been invited",
                        user
                    )));
                }
                Ok(json!({ "id": invitation_id(&user), "username": user }))
            }
            (Delete, ["association_requests", id]) => {
                let user = id.strip_suffix("-invitation").unwrap_or(*id);
                if !self.invitations.remove(user) {
                    return Err(RestError::NotFound);
                }
                Ok(json!({ "id": id }))
            }

            (Get, ["data"]) => Ok(listing("data", self.data_bags.keys())),
            (Post, ["data"]) => {
                let bag = field(require_body(body)?, "name")?.to_string();
                if self.data_bags.contains_key(&bag) {
                    return Err(RestError::Conflict(format!("Data bag {} already exists", bag)));
                }
                self.data_bags.insert(bag.clone(), BTreeMap::new());
                Ok(json!({ "uri": format!("/data/{}", bag) }))
            }
            (Get, ["data", bag]) => {
                let items = self.data_bags.get(*bag).ok_or(RestError::NotFound)?;
                Ok(listing(&format!("data/{}", bag), items.keys()))
            }
            (Post, ["data", bag]) => {
                let body = require_body(body)?;
                let id = field(body, "id")?.to_string();
                let items = self.data_bags.get_mut(*bag).ok_or(RestError::NotFound)?;
                if items.contains_key(&id) {
                    return Err(RestError::Conflict(format!("Data bag item {} already exists", id)));
                }
                items.insert(id, body.clone());
                Ok(body.clone())
            }
            (Delete, ["data", bag]) => {
                self.data_bags.remove(*bag).ok_or(RestError::NotFound)?;
                self.acls.remove(&format!("/data/{}", bag));
                Ok(json!({ "name": bag }))
            }
            (_, ["data", bag, item]) => {
                let items = self.data_bags.get_mut(*bag).ok_or(RestError::NotFound)?;
                document(items, method, item, body)
            }

            (Get, [collection @ ("cookbooks" | "cookbook_artifacts")]) => {
                let versions = self.versioned(collection);
                Ok(version_listing(collection, versions.iter()))
            }
            (Get, [collection @ ("cookbooks" | "cookbook_artifacts"), name]) => {
                let versions = self.versioned(collection);
                let entry = versions.get_key_value(*name).ok_or(RestError::NotFound)?;
                Ok(version_listing(collection, std::iter::once(entry)))
            }
            (Get, [collection @ ("cookbooks" | "cookbook_artifacts"), name, version]) => self
                .versioned(collection)
                .get(*name)
                .and_then(|versions| versions.get(*version))
                .cloned()
                .ok_or(RestError::NotFound),
            (Put, [collection @ ("cookbooks" | "cookbook_artifacts"), name, version]) => {
                let manifest = require_body(body)?.clone();
                self.check_checksums(&manifest)?;
                let artifact = *collection == "cookbook_artifacts";
                let existing = self
                    .versioned(collection)
                    .get(*name)
                    .and_then(|versions| versions.get(*version));
                if let Some(existing) = existing {
                    if artifact {
                        return Err(RestError::Conflict(format!(
                            "Cookbook artifact {} {} already exists",
                            name, version
                        )));
                    }
                    if is_frozen(existing) && !force {
                        return Err(RestError::Conflict(format!(
                            "The cookbook {} at version {} is frozen. Use the 'force' option to override.",
                            name, version
                        )));
                    }
                }
                self.versioned_mut(collection)
                    .entry(name.to_string())
                    .or_default()
                    .insert(version.to_string(), manifest.clone());
                Ok(manifest)
            }
            (Delete, [collection @ ("cookbooks" | "cookbook_artifacts"), name, version]) => {
                let versions = self.versioned_mut(collection);
                let removed = versions
                    .get_mut(*name)
                    .and_then(|v| v.remove(*version))
                    .ok_or(RestError::NotFound)?;
                if versions.get(*name).is_some_and(BTreeMap::is_empty) {
                    versions.remove(*name);
                    self.acls.remove(&format!("/{}/{}", collection, name));
                }
                Ok(removed)
            }

            (Get, ["policies"]) => Ok(policy_listing(self.policies.iter())),
            (Get, ["policies", name]) => {
                let entry = self.policies.get_key_value(*name).ok_or(RestError::NotFound)?;
                Ok(policy_listing(std::iter::once(entry)))
            }
            (Delete, ["policies", name]) => {
                self.policies.remove(*name).ok_or(RestError::NotFound)?;
                self.acls.remove(&format!("/policies/{}", name));
                Ok(json!({ "name": name }))
            }
            (Post, ["policies", name, "revisions"]) => {
                let body = require_body(body)?;
                let revision = field(body, "revision_id")?.to_string();
                let revisions = self.policies.entry(name.to_string()).or_default();
                if revisions.contains_key(&revision) {
                    return Err(RestError::Conflict(format!(
                        "Policy revision {} {} already exists",
                        name, revision
                    )));
                }
                revisions.insert(revision, body.clone());
                Ok(body.clone())
            }
            (Get, ["policies", name, "revisions", revision]) => self
                .policies
                .get(*name)
                .and_then(|revisions| revisions.get(*revision))
                .cloned()
                .ok_or(RestError::NotFound),
            (Delete, ["policies", name, "revisions", revision]) => {
                let removed = self
                    .policies
                    .get_mut(*name)
                    .and_then(|revisions| revisions.remove(*revision))
                    .ok_or(RestError::NotFound)?;
                if self.policies.get(*name).is_some_and(BTreeMap::is_empty) {
                    self.policies.remove(*name);
                    self.acls.remove(&format!("/policies/{}", name));
                }
                Ok(removed)
            }

            (_, [kind, rest @ ..]) if DOCUMENT_KINDS.contains(kind) => {
                self.document_kind(method, kind, rest, body)
            }

            (Get, _) => Err(RestError::NotFound),
            _ => Err(RestError::MethodNotAllowed(format!(
                "{:?} /{}",
                method,
                segments.join("/")
            ))),
        }
    }

    fn document_kind(
        &mut self,
        method: Method,
        kind: &str,
        rest: &[&str],
        body: Option<&Value>,
    ) -> Result<Value> {
        let objects = self.objects.entry(kind.to_string()).or_default();
        match (method, rest) {
            (Method::Get, []) => Ok(listing(kind, objects.keys())),
            (Method::Post, []) => {
                let body = require_body(body)?;
                let name = field(body, create_name_field(kind))?.to_string();
                if objects.contains_key(&name) {
                    return Err(RestError::Conflict(format!("{} {} already exists", kind, name)));
                }
                objects.insert(name, body.clone());
                Ok(body.clone())
            }
            (Method::Put | Method::Delete, ["_default"]) if kind == "environments" => {
                Err(RestError::MethodNotAllowed(
                    "The '_default' environment cannot be modified.".to_string(),
                ))
            }
            (Method::Put, [name]) if kind == "policy_groups" => {
                let body = require_body(body)?;
                objects.insert(name.to_string(), body.clone());
                Ok(body.clone())
            }
            (Method::Delete, [name]) => {
                let removed = objects.remove(*name).ok_or(RestError::NotFound)?;
                self.acls.remove(&format!("/{}/{}", kind, name));
                Ok(removed)
            }
            (_, [name]) => document(objects, method, name, body),
            (Method::Get, _) => Err(RestError::NotFound),
            _ => Err(RestError::MethodNotAllowed(format!("{:?} /{}", method, kind))),
        }
    }

    fn acl(
        &mut self,
        method: Method,
        target: &[&str],
        permission: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Value> {
        if !self.acl_target_exists(target) {
            return Err(RestError::NotFound);
        }
        let key = format!("/{}", target.join("/"));
        match (method, permission) {
            (Method::Get, None) => Ok(self.acls.get(&key).cloned().unwrap_or_else(default_acl)),
            (Method::Put, Some(permission)) if PERMISSIONS.contains(&permission) => {
                let ace = require_body(body)?
                    .get(permission)
                    .cloned()
                    .ok_or_else(|| {
                        RestError::BadRequest(format!("Field '{}' missing", permission))
                    })?;
                let acl = self.acls.entry(key).or_insert_with(default_acl);
                if let Some(object) = acl.as_object_mut() {
                    object.insert(permission.to_string(), ace);
                }
                Ok(acl.clone())
            }
            (Method::Get, Some(_)) => Err(RestError::NotFound),
            _ => Err(RestError::MethodNotAllowed(format!("{:?} {}/_acl", method, key))),
        }
    }

    fn acl_target_exists(&self, target: &[&str]) -> bool {
        match target {
            ["organizations"] => true,
            ["data", bag] => self.data_bags.contains_key(*bag),
            ["cookbooks", name] => self.cookbooks.contains_key(*name),
            ["cookbook_artifacts", name] => self.cookbook_artifacts.contains_key(*name),
            ["policies", name] => self.policies.contains_key(*name),
            [kind, name] => self
                .objects
                .get(*kind)
                .is_some_and(|objects| objects.contains_key(*name)),
            _ => false,
        }
    }

    fn versioned(&self, collection: &str) -> &Versions {
        if collection == "cookbook_artifacts" {
            &self.cookbook_artifacts
        } else {
            &self.cookbooks
        }
    }

    fn versioned_mut(&mut self, collection: &str) -> &mut Versions {
        if collection == "cookbook_artifacts" {
            &mut self.cookbook_artifacts
        } else {
            &mut self.cookbooks
        }
    }

    fn check_checksums(&self, manifest: &Value) -> Result<()> {
        let files = manifest
            .get("all_files")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for file in files {
            let checksum = file.get("checksum").and_then(Value::as_str).unwrap_or("");
            if !self.file_store.contains_key(checksum) {
                return Err(RestError::BadRequest(format!(
                    "Manifest has a checksum that hasn't been uploaded: {}",
                    checksum
                )));
            }
        }
        Ok(())
    }
}

/// GET, PUT or DELETE on a single stored document.
fn document(
    objects: &mut BTreeMap<String, Value>,
    method: Method,
    name: &str,
    body: Option<&Value>,
) -> Result<Value> {
    match method {
        Method::Get => objects.get(name).cloned().ok_or(RestError::NotFound),
        Method::Put => {
            let existing = objects.get_mut(name).ok_or(RestError::NotFound)?;
            *existing = require_body(body)?.clone();
            Ok(existing.clone())
        }
        Method::Delete => objects.remove(name).ok_or(RestError::NotFound),
        Method::Post => Err(RestError::MethodNotAllowed(format!("POST {}", name))),
    }
}

fn create_name_field(kind: &str) -> &'static str {
    match kind {
        "containers" => "containername",
        "groups" => "groupname",
        _ => "name",
    }
}

fn listing<'a>(prefix: &str, names: impl Iterator<Item = &'a String>) -> Value {
    let entries: Map<String, Value> = names
        .map(|name| (name.clone(), json!(format!("/{}/{}", prefix, name))))
        .collect();
    Value::Object(entries)
}

fn version_listing<'a>(
    collection: &str,
    entries: impl Iterator<Item = (&'a String, &'a BTreeMap<String, Value>)>,
) -> Value {
    let key = if collection == "cookbook_artifacts" {
        "identifier"
    } else {
        "version"
    };
    let listing: Map<String, Value> = entries
        .map(|(name, versions)| {
            let versions: Vec<Value> = versions
                .keys()
                .map(|v| json!({ key: v, "url": format!("/{}/{}/{}", collection, name, v) }))
                .collect();
            (
                name.clone(),
                json!({ "url": format!("/{}/{}", collection, name), "versions": versions }),
            )
        })
        .collect();
    Value::Object(listing)
}

fn policy_listing<'a>(
    entries: impl Iterator<Item = (&'a String, &'a BTreeMap<String, Value>)>,
) -> Value {
    let listing: Map<String, Value> = entries
        .map(|(name, revisions)| {
            let revisions: Map<String, Value> =
                revisions.keys().map(|r| (r.clone(), json!({}))).collect();
            (
                name.clone(),
                json!({ "uri": format!("/policies/{}", name), "revisions": revisions }),
            )
        })
        .collect();
    Value::Object(listing)
}

fn default_acl() -> Value {
    let ace = json!({ "actors": ["pivotal"], "groups": ["admins"] });
    let acl: Map<String, Value> = PERMISSIONS
        .iter()
        .map(|p| (p.to_string(), ace.clone()))
        .collect();
    Value::Object(acl)
}

fn is_frozen(manifest: &Value) -> bool {
    manifest
        .get("frozen?")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn invitation_id(user: &str) -> String {
    format!("{}-invitation", user)
}

fn require_body(body: Option<&Value>) -> Result<&Value> {
    body.ok_or_else(|| RestError::BadRequest("missing request body".to_string()))
}

fn field<'a>(body: &'a Value, key: &str) -> Result<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| RestError::BadRequest(format!("Field '{}' missing", key)))
}

fn file_store_key(path: &str) -> Result<&str> {
    path.strip_prefix("/file_store/")
        .filter(|checksum| !checksum.is_empty() && !checksum.contains('/'))
        .ok_or(RestError::NotFound)
}

fn storage_error(path: &Path, error: impl std::fmt::Display) -> RestError {
    RestError::Storage {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}
