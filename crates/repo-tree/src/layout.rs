//! Repository layout: which collections exist and what each path means
//!
//! Both backends share this classification so that a path such as
//! `/data_bags/users/alice.json` means the same thing locally and remotely.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::objects::ObjectKind;
use crate::path::ChefPath;

/// Which set of top-level collections a repository carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoMode {
    /// Objects that live in a plain repository
    Static,
    /// Everything an open-source server exposes
    Everything,
    /// Everything a multi-tenant server exposes, including org objects
    HostedEverything,
}

impl RepoMode {
    /// Pick the mode implied by a server URL.
    pub fn detect(server_url: Option<&str>) -> Self {
        match server_url {
            Some(url) if url.contains("/organizations/") => Self::HostedEverything,
            _ => Self::Everything,
        }
    }

    /// Top-level collections, in lexical order.
    pub fn collections(&self) -> &'static [Collection] {
        use Collection::*;
        match self {
            Self::Static => &[Cookbooks, DataBags, Environments, Roles],
            Self::Everything => &[Clients, Cookbooks, DataBags, Environments, Nodes, Roles, Users],
            Self::HostedEverything => &[
                Acls,
                Clients,
                Containers,
                CookbookArtifacts,
                Cookbooks,
                DataBags,
                Environments,
                Groups,
                Nodes,
                Policies,
                PolicyGroups,
                Roles,
            ],
        }
    }

    /// Organization singletons at the root (`org.json` and friends).
    pub fn singletons(&self) -> &'static [&'static str] {
        match self {
            Self::HostedEverything => &["invitations.json", "members.json", "org.json"],
            _ => &[],
        }
    }

    pub fn has_collection(&self, collection: Collection) -> bool {
        self.collections().contains(&collection)
    }

    /// Names of everything directly under the root, sorted.
    pub fn root_children(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections()
            .iter()
            .map(|c| c.name().to_string())
            .chain(self.singletons().iter().map(|s| s.to_string()))
            .collect();
        names.sort();
        names
    }
}

impl fmt::Display for RepoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Everything => write!(f, "everything"),
            Self::HostedEverything => write!(f, "hosted_everything"),
        }
    }
}

impl FromStr for RepoMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(Self::Static),
            "everything" => Ok(Self::Everything),
            "hosted_everything" => Ok(Self::HostedEverything),
            other => Err(format!(
                "unknown repo mode '{}' (expected static, everything or hosted_everything)",
                other
            )),
        }
    }
}

/// A top-level collection directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Acls,
    Clients,
    Containers,
    CookbookArtifacts,
    Cookbooks,
    DataBags,
    Environments,
    Groups,
    Nodes,
    Policies,
    PolicyGroups,
    Roles,
    Users,
}

impl Collection {
    pub const ALL: [Collection; 13] = [
        Collection::Acls,
        Collection::Clients,
        Collection::Containers,
        Collection::CookbookArtifacts,
        Collection::Cookbooks,
        Collection::DataBags,
        Collection::Environments,
        Collection::Groups,
        Collection::Nodes,
        Collection::Policies,
        Collection::PolicyGroups,
        Collection::Roles,
        Collection::Users,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Acls => "acls",
            Self::Clients => "clients",
            Self::Containers => "containers",
            Self::CookbookArtifacts => "cookbook_artifacts",
            Self::Cookbooks => "cookbooks",
            Self::DataBags => "data_bags",
            Self::Environments => "environments",
            Self::Groups => "groups",
            Self::Nodes => "nodes",
            Self::Policies => "policies",
            Self::PolicyGroups => "policy_groups",
            Self::Roles => "roles",
            Self::Users => "users",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// The object kind stored as `<name>.json` directly in this collection.
    pub fn json_kind(&self) -> Option<ObjectKind> {
        match self {
            Self::Clients => Some(ObjectKind::Client),
            Self::Containers => Some(ObjectKind::Container),
            Self::Environments => Some(ObjectKind::Environment),
            Self::Groups => Some(ObjectKind::Group),
            Self::Nodes => Some(ObjectKind::Node),
            Self::Policies => Some(ObjectKind::Policy),
            Self::PolicyGroups => Some(ObjectKind::PolicyGroup),
            Self::Roles => Some(ObjectKind::Role),
            Self::Users => Some(ObjectKind::User),
            Self::Acls | Self::CookbookArtifacts | Self::Cookbooks | Self::DataBags => None,
        }
    }

    /// Whether entries are directory trees of cookbook files.
    pub fn holds_cookbooks(&self) -> bool {
        matches!(self, Self::Cookbooks | Self::CookbookArtifacts)
    }
}

/// Object kinds that carry an ACL under `/acls/<kind>/`.
pub const ACL_KINDS: &[&str] = &[
    "clients",
    "containers",
    "cookbook_artifacts",
    "cookbooks",
    "data_bags",
    "environments",
    "groups",
    "nodes",
    "policies",
    "policy_groups",
    "roles",
];

/// Top-level directories allowed inside a cookbook on the server.
pub const COOKBOOK_SEGMENTS: &[&str] = &[
    "attributes",
    "definitions",
    "files",
    "libraries",
    "providers",
    "recipes",
    "resources",
    "templates",
];

pub const DEFAULT_ENVIRONMENT: &str = "/environments/_default.json";

/// What a namespace path denotes, independent of backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Root,
    Collection(Collection),
    /// `org.json`, `members.json` or `invitations.json`
    Singleton(ObjectKind),
    /// A JSON document named `<name>.json`
    Object { kind: ObjectKind, name: String },
    DataBag { bag: String },
    AclDir { kind: String },
    /// A cookbook (or cookbook artifact) directory such as `/cookbooks/apache2`
    Cookbook {
        collection: Collection,
        dir_name: String,
    },
    /// A file or directory inside a cookbook
    CookbookEntry {
        collection: Collection,
        dir_name: String,
        relative: String,
    },
    /// Not part of the namespace for this mode
    Invalid,
}

impl Location {
    pub fn is_container(&self) -> Option<bool> {
        match self {
            Self::Root
            | Self::Collection(_)
            | Self::DataBag { .. }
            | Self::AclDir { .. }
            | Self::Cookbook { .. } => Some(true),
            Self::Singleton(_) | Self::Object { .. } => Some(false),
            Self::CookbookEntry { .. } | Self::Invalid => None,
        }
    }

    /// Root and top-level collections, which no operation may mutate.
    pub fn is_system(&self) -> bool {
        matches!(self, Self::Root | Self::Collection(_))
    }

    /// The root path of the cookbook a location belongs to.
    pub fn cookbook_root(&self) -> Option<ChefPath> {
        match self {
            Self::Cookbook {
                collection,
                dir_name,
            }
            | Self::CookbookEntry {
                collection,
                dir_name,
                ..
            } => Some(ChefPath::root().join(collection.name()).join(dir_name)),
            _ => None,
        }
    }
}

/// Immutable layout settings shared by both backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub mode: RepoMode,
    /// Cookbook directories are `name-version` rather than `name`
    pub versioned_cookbooks: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            mode: RepoMode::Everything,
            versioned_cookbooks: false,
        }
    }
}

impl Layout {
    pub fn new(mode: RepoMode, versioned_cookbooks: bool) -> Self {
        Self {
            mode,
            versioned_cookbooks,
        }
    }

    /// Classify a namespace path.
    pub fn locate(&self, path: &ChefPath) -> Location {
        let segments = path.segments();
        let Some((&top, rest)) = segments.split_first() else {
            return Location::Root;
        };

        if rest.is_empty() && self.mode.singletons().contains(&top) {
            return match top {
                "org.json" => Location::Singleton(ObjectKind::Organization),
                "members.json" => Location::Singleton(ObjectKind::Members),
                _ => Location::Singleton(ObjectKind::Invitations),
            };
        }

        let Some(collection) = Collection::from_name(top) else {
            return Location::Invalid;
        };
        if !self.mode.has_collection(collection) {
            return Location::Invalid;
        }
        if rest.is_empty() {
            return Location::Collection(collection);
        }

        match collection {
            Collection::Cookbooks | Collection::CookbookArtifacts => {
                let dir_name = rest[0].to_string();
                if dir_name.starts_with('.') {
                    return Location::Invalid;
                }
                if rest.len() == 1 {
                    Location::Cookbook {
                        collection,
                        dir_name,
                    }
                } else {
                    Location::CookbookEntry {
                        collection,
                        dir_name,
                        relative: rest[1..].join("/"),
                    }
                }
            }
            Collection::DataBags => match rest {
                [bag] => Location::DataBag {
                    bag: bag.to_string(),
                },
                [_, item] => json_object(ObjectKind::DataBagItem, item),
                _ => Location::Invalid,
            },
            Collection::Acls => match rest {
                ["organization.json"] => Location::Object {
                    kind: ObjectKind::Acl,
                    name: "organization".to_string(),
                },
                [kind] if ACL_KINDS.contains(kind) => Location::AclDir {
                    kind: kind.to_string(),
                },
                [kind, name] if ACL_KINDS.contains(kind) => json_object(ObjectKind::Acl, name),
                _ => Location::Invalid,
            },
            _ => match (rest, collection.json_kind()) {
                ([name], Some(kind)) => json_object(kind, name),
                _ => Location::Invalid,
            },
        }
    }

    /// Whether a child with this name and shape is valid for the layout.
    pub fn accepts_child(&self, parent: &ChefPath, name: &str, is_container: bool) -> bool {
        if name.starts_with('.') {
            return false;
        }
        match self.locate(&parent.join(name)) {
            Location::Invalid => false,
            Location::CookbookEntry { .. } => true,
            other => other.is_container() == Some(is_container),
        }
    }
}

fn json_object(kind: ObjectKind, file_name: &str) -> Location {
    match file_name.strip_suffix(".json") {
        Some(name) if !name.is_empty() && !file_name.starts_with('.') => Location::Object {
            kind,
            name: name.to_string(),
        },
        _ => Location::Invalid,
    }
}
