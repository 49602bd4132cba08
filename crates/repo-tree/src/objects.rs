//! Per-kind JSON handling: defaults, normalization and name checks
//!
//! Two stored objects are the same when their normalized forms are equal.
//! Normalizing fills in every default the server would report, so a role
//! file that omits `chef_type` or `run_list` equals one that spells them out.

use serde_json::{Map, Value, json};

use crate::run_list::RunListItem;

/// The JSON object kinds in the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Acl,
    Client,
    Container,
    DataBagItem,
    Environment,
    Group,
    Invitations,
    Members,
    Node,
    Organization,
    Policy,
    PolicyGroup,
    Role,
    User,
}

impl ObjectKind {
    /// The field that must match the file name, if the kind has one.
    pub fn name_field(&self) -> Option<&'static str> {
        match self {
            Self::Client
            | Self::Environment
            | Self::Node
            | Self::Role
            | Self::User => Some("name"),
            Self::Container => Some("containername"),
            Self::Group => Some("groupname"),
            Self::DataBagItem => Some("id"),
            Self::Policy => Some("name"),
            Self::Acl
            | Self::Invitations
            | Self::Members
            | Self::Organization
            | Self::PolicyGroup => None,
        }
    }

    /// Plural noun used in immutability messages.
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Acl => "acls",
            Self::Client => "clients",
            Self::Container => "containers",
            Self::DataBagItem => "data bag items",
            Self::Environment => "environments",
            Self::Group => "groups",
            Self::Invitations => "invitations",
            Self::Members => "members",
            Self::Node => "nodes",
            Self::Organization => "organizations",
            Self::Policy => "policy revisions",
            Self::PolicyGroup => "policy groups",
            Self::Role => "roles",
            Self::User => "users",
        }
    }

    /// Policy revisions can be created or deleted, never updated.
    pub fn is_immutable(&self) -> bool {
        matches!(self, Self::Policy)
    }

    /// The object every stored document of this kind is compared against.
    pub fn defaults(&self, name: &str) -> Value {
        match self {
            Self::Role => json!({
                "name": name,
                "description": "",
                "json_class": "Chef::Role",
                "chef_type": "role",
                "default_attributes": {},
                "override_attributes": {},
                "run_list": [],
                "env_run_lists": {},
            }),
            Self::Environment => json!({
                "name": name,
                "description": "",
                "cookbook_versions": {},
                "json_class": "Chef::Environment",
                "chef_type": "environment",
                "default_attributes": {},
                "override_attributes": {},
            }),
            Self::Node => json!({
                "name": name,
                "json_class": "Chef::Node",
                "chef_type": "node",
                "chef_environment": "_default",
                "override": {},
                "normal": {},
                "default": {},
                "automatic": {},
                "run_list": [],
            }),
            Self::Client => json!({
                "name": name,
                "admin": false,
                "validator": false,
                "json_class": "Chef::ApiClient",
                "chef_type": "client",
            }),
            Self::User => json!({
                "name": name,
                "admin": false,
                "json_class": "Chef::User",
                "chef_type": "user",
            }),
            Self::Container => json!({
                "containername": name,
                "containerpath": name,
            }),
            Self::Group => json!({
                "groupname": name,
                "users": [],
                "clients": [],
                "groups": [],
            }),
            Self::DataBagItem => json!({ "id": name }),
            Self::Acl => {
                let ace = json!({ "actors": [], "groups": [] });
                json!({
                    "create": ace,
                    "read": ace,
                    "update": ace,
                    "delete": ace,
                    "grant": ace,
                })
            }
            Self::Policy => {
                let (policy, revision) = split_policy_name(name);
                json!({
                    "name": policy,
                    "revision_id": revision,
                    "run_list": [],
                    "cookbook_locks": {},
                })
            }
            Self::PolicyGroup => json!({ "policies": {} }),
            Self::Organization => json!({}),
            Self::Members | Self::Invitations => json!([]),
        }
    }

    /// Keys kept by [`minimize`] even when they hold their default value.
    fn preserved_keys(&self) -> &'static [&'static str] {
        match self {
            Self::DataBagItem => &["id"],
            Self::Container => &["containername"],
            Self::Group => &["groupname"],
            Self::Policy => &["name", "revision_id"],
            Self::Acl
            | Self::Members
            | Self::Invitations
            | Self::Organization
            | Self::PolicyGroup => &[],
            _ => &["name"],
        }
    }
}

/// Split a policy file name `app-0f3a9c` into policy name and revision.
pub fn split_policy_name(name: &str) -> (&str, &str) {
    name.rsplit_once('-').unwrap_or((name, ""))
}

/// Fill defaults and canonicalize run lists.
///
/// Non-object documents (other than member and invitation lists) are
/// returned unchanged.
pub fn normalize(kind: ObjectKind, name: &str, value: &Value) -> Value {
    let defaults = kind.defaults(name);
    match (value, defaults) {
        (Value::Object(object), Value::Object(defaults)) => {
            let mut result = defaults;
            if kind == ObjectKind::Acl {
                merge_acl(&mut result, object);
            } else {
                for (key, field) in object {
                    result.insert(key.clone(), field.clone());
                }
            }
            canonicalize_run_lists(&mut result);
            Value::Object(result)
        }
        (Value::Array(items), Value::Array(_)) => {
            let mut names: Vec<String> = items.iter().filter_map(member_name).collect();
            names.sort();
            names.dedup();
            json!(names)
        }
        (other, _) => other.clone(),
    }
}

/// Strip fields equal to their defaults, for writing into a repository.
pub fn minimize(kind: ObjectKind, name: &str, value: &Value) -> Value {
    let normalized = normalize(kind, name, value);
    let defaults = kind.defaults(name);
    match (normalized, defaults) {
        (Value::Object(object), Value::Object(defaults)) => {
            let preserved = kind.preserved_keys();
            let minimized: Map<String, Value> = object
                .into_iter()
                .filter(|(key, field)| {
                    preserved.contains(&key.as_str()) || defaults.get(key) != Some(field)
                })
                .collect();
            Value::Object(minimized)
        }
        (other, _) => other,
    }
}

/// Semantic equality of two stored documents.
pub fn objects_equal(kind: ObjectKind, name: &str, left: &Value, right: &Value) -> bool {
    normalize(kind, name, left) == normalize(kind, name, right)
}

/// Check the embedded name against the file name.
///
/// Returns the embedded name when it disagrees with `name`. A missing name
/// field is fine: normalization fills it in.
pub fn name_mismatch(kind: ObjectKind, name: &str, value: &Value) -> Option<(String, String)> {
    let field = kind.name_field()?;
    let expected = match kind {
        ObjectKind::Policy => split_policy_name(name).0,
        _ => name,
    };
    let actual = value.get(field)?.as_str()?;
    if actual == expected {
        None
    } else {
        Some((expected.to_string(), actual.to_string()))
    }
}

fn merge_acl(result: &mut Map<String, Value>, object: &Map<String, Value>) {
    for (permission, ace) in object {
        let Some(ace) = ace.as_object() else {
            result.insert(permission.clone(), ace.clone());
            continue;
        };
        let mut merged = Map::new();
        for key in ["actors", "groups"] {
            let mut members: Vec<String> = ace
                .get(key)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            members.sort();
            merged.insert(key.to_string(), json!(members));
        }
        for (key, field) in ace {
            if key != "actors" && key != "groups" {
                merged.insert(key.clone(), field.clone());
            }
        }
        result.insert(permission.clone(), Value::Object(merged));
    }
}

fn canonicalize_run_lists(object: &mut Map<String, Value>) {
    if let Some(run_list) = object.get_mut("run_list") {
        canonicalize_run_list(run_list);
    }
    if let Some(Value::Object(env_run_lists)) = object.get_mut("env_run_lists") {
        for run_list in env_run_lists.values_mut() {
            canonicalize_run_list(run_list);
        }
    }
}

fn canonicalize_run_list(run_list: &mut Value) {
    if let Value::Array(items) = run_list {
        for item in items.iter_mut() {
            if let Some(parsed) = item.as_str().and_then(RunListItem::parse) {
                *item = Value::String(parsed.to_string());
            }
        }
    }
}

/// Accepts `"alice"`, `{"username": "alice"}` or `{"user": {"username": "alice"}}`.
fn member_name(item: &Value) -> Option<String> {
    match item {
        Value::String(name) => Some(name.clone()),
        Value::Object(object) => object
            .get("username")
            .or_else(|| object.get("user").and_then(|u| u.get("username")))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_role_equals_spelled_out_defaults() {
        let explicit = json!({
            "name": "x",
            "description": "",
            "json_class": "Chef::Role",
            "chef_type": "role",
            "default_attributes": {},
            "override_attributes": {},
            "run_list": [],
            "env_run_lists": {}
        });
        assert!(objects_equal(ObjectKind::Role, "x", &json!({}), &explicit));
    }

    #[test]
    fn test_run_list_shorthand_is_canonicalized() {
        let left = json!({ "run_list": ["apache2", "role[base]"] });
        let right = json!({ "run_list": ["recipe[apache2]", "role[base]"] });
        assert!(objects_equal(ObjectKind::Role, "web", &left, &right));
    }

    #[test]
    fn test_different_attributes_are_not_equal() {
        let left = json!({ "description": "a" });
        let right = json!({ "description": "b" });
        assert!(!objects_equal(ObjectKind::Environment, "x", &left, &right));
    }

    #[test]
    fn test_minimize_keeps_name_and_drops_defaults() {
        let value = json!({
            "name": "web",
            "chef_type": "role",
            "run_list": ["recipe[apache2]"],
            "description": ""
        });
        assert_eq!(
            minimize(ObjectKind::Role, "web", &value),
            json!({ "name": "web", "run_list": ["recipe[apache2]"] })
        );
    }

    #[test]
    fn test_minimize_data_bag_item_keeps_id() {
        assert_eq!(
            minimize(ObjectKind::DataBagItem, "alice", &json!({})),
            json!({ "id": "alice" })
        );
    }

    #[test]
    fn test_name_mismatch() {
        assert_eq!(
            name_mismatch(ObjectKind::Role, "x", &json!({ "name": "y" })),
            Some(("x".to_string(), "y".to_string()))
        );
        assert_eq!(name_mismatch(ObjectKind::Role, "x", &json!({})), None);
        assert_eq!(
            name_mismatch(ObjectKind::DataBagItem, "a", &json!({ "id": "a" })),
            None
        );
        assert_eq!(
            name_mismatch(ObjectKind::Policy, "app-abc123", &json!({ "name": "app" })),
            None
        );
    }

    #[test]
    fn test_members_compare_as_sorted_names() {
        let wire = json!([{ "user": { "username": "bob" } }, { "user": { "username": "alice" } }]);
        let local = json!(["alice", "bob"]);
        assert!(objects_equal(ObjectKind::Members, "members", &wire, &local));
    }

    #[test]
    fn test_acl_member_order_is_irrelevant() {
        let left = json!({ "read": { "actors": ["b", "a"], "groups": [] } });
        let right = json!({ "read": { "actors": ["a", "b"] } });
        assert!(objects_equal(ObjectKind::Acl, "web", &left, &right));
    }
}
