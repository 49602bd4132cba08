//! Where each namespace path lives on the server

use repo_tree::objects::split_policy_name;
use repo_tree::{ChefPath, Collection, Location, ObjectKind};

/// REST collection for a top-level directory.
pub fn collection(collection: Collection) -> String {
    match collection {
        Collection::DataBags => "/data".to_string(),
        other => format!("/{}", other.name()),
    }
}

/// REST collection that plain documents of `kind` are created in.
pub fn document_collection(kind: ObjectKind) -> Option<&'static str> {
    match kind {
        ObjectKind::Client => Some("/clients"),
        ObjectKind::Container => Some("/containers"),
        ObjectKind::Environment => Some("/environments"),
        ObjectKind::Group => Some("/groups"),
        ObjectKind::Node => Some("/nodes"),
        ObjectKind::PolicyGroup => Some("/policy_groups"),
        ObjectKind::Role => Some("/roles"),
        ObjectKind::User => Some("/users"),
        _ => None,
    }
}

/// Endpoint for a JSON leaf, or `None` if the location is not a document.
pub fn document(path: &ChefPath, location: &Location) -> Option<String> {
    match location {
        Location::Singleton(ObjectKind::Organization) => Some("/organization".to_string()),
        Location::Singleton(ObjectKind::Members) => Some("/members".to_string()),
        Location::Singleton(_) => Some("/association_requests".to_string()),
        Location::Object { kind, name } => match kind {
            ObjectKind::DataBagItem => {
                let segments = path.segments();
                Some(format!("/data/{}/{}", segments.get(1)?, name))
            }
            ObjectKind::Acl => acl(path, name),
            ObjectKind::Policy => {
                let (policy, revision) = split_policy_name(name);
                Some(policy_revision(policy, revision))
            }
            other => Some(format!("{}/{}", document_collection(*other)?, name)),
        },
        _ => None,
    }
}

/// ACL endpoint for `/acls/<kind>/<name>.json` or `/acls/organization.json`.
fn acl(path: &ChefPath, name: &str) -> Option<String> {
    match path.segments().as_slice() {
        ["acls", "organization.json"] => Some("/organizations/_acl".to_string()),
        ["acls", kind, _] => Some(format!("{}/{}/_acl", acl_kind(kind), name)),
        _ => None,
    }
}

/// REST collection behind an `/acls/<kind>` directory.
pub fn acl_kind(kind: &str) -> String {
    match kind {
        "data_bags" => "/data".to_string(),
        other => format!("/{}", other),
    }
}

pub fn data_bag(bag: &str) -> String {
    format!("/data/{}", bag)
}

pub fn cookbook_versions(collection: Collection, name: &str) -> String {
    format!("/{}/{}", collection.name(), name)
}

pub fn cookbook_version(collection: Collection, name: &str, version: &str) -> String {
    format!("/{}/{}/{}", collection.name(), name, version)
}

pub fn policy_revisions(policy: &str) -> String {
    format!("/policies/{}/revisions", policy)
}

pub fn policy_revision(policy: &str, revision: &str) -> String {
    format!("/policies/{}/revisions/{}", policy, revision)
}

pub fn file_store(checksum: &str) -> String {
    format!("/file_store/{}", checksum)
}
