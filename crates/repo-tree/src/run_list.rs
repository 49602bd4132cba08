//! Run list entries: `role[base]`, `recipe[apache2::mod_ssl]`, `apache2`

use std::fmt;

/// One entry of a node or role run list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunListItem {
    Role(String),
    Recipe {
        cookbook: String,
        recipe: Option<String>,
        version: Option<String>,
    },
}

impl RunListItem {
    /// Parse a run list entry. Bare names are recipes.
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }
        if let Some(name) = bracketed(entry, "role") {
            return (!name.is_empty()).then(|| Self::Role(name.to_string()));
        }
        let spec = bracketed(entry, "recipe").unwrap_or(entry);
        let (spec, version) = match spec.split_once('@') {
            Some((spec, version)) => (spec, Some(version.to_string())),
            None => (spec, None),
        };
        let (cookbook, recipe) = match spec.split_once("::") {
            Some((cookbook, recipe)) => (cookbook, Some(recipe.to_string())),
            None => (spec, None),
        };
        if cookbook.is_empty() || cookbook.contains(['[', ']']) {
            return None;
        }
        Some(Self::Recipe {
            cookbook: cookbook.to_string(),
            recipe,
            version,
        })
    }

    /// The cookbook a recipe entry belongs to.
    pub fn cookbook(&self) -> Option<&str> {
        match self {
            Self::Recipe { cookbook, .. } => Some(cookbook),
            Self::Role(_) => None,
        }
    }
}

fn bracketed<'a>(entry: &'a str, prefix: &str) -> Option<&'a str> {
    entry
        .strip_prefix(prefix)?
        .strip_prefix('[')?
        .strip_suffix(']')
}

impl fmt::Display for RunListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role(name) => write!(f, "role[{}]", name),
            Self::Recipe {
                cookbook,
                recipe,
                version,
            } => {
                write!(f, "recipe[{}", cookbook)?;
                if let Some(recipe) = recipe {
                    write!(f, "::{}", recipe)?;
                }
                if let Some(version) = version {
                    write!(f, "@{}", version)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Parse every string entry of a JSON run list, skipping malformed ones.
pub fn parse_run_list(value: Option<&serde_json::Value>) -> Vec<RunListItem> {
    value
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().and_then(RunListItem::parse))
                .collect()
        })
        .unwrap_or_default()
}
