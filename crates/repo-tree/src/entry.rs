//! Entry kinds and leaf content

use std::fmt;

use serde_json::Value;

use crate::cookbook::CookbookBundle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Container,
    Leaf,
}

impl EntryKind {
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Container)
    }
}

/// Which backend a tree talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Local,
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// What a backend hands back from `read`.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// A parsed JSON document
    Json(Value),
    /// Opaque bytes, such as a cookbook file
    Raw(Vec<u8>),
    /// A stored JSON document that failed to parse
    Unparsed { bytes: Vec<u8>, error: String },
    /// A whole cookbook version
    Cookbook(CookbookBundle),
}

impl Content {
    /// Parse bytes that are expected to hold JSON, keeping them on failure.
    pub fn from_json_bytes(bytes: Vec<u8>) -> Self {
        match serde_json::from_slice(&bytes) {
            Ok(value) => Self::Json(value),
            Err(e) => Self::Unparsed {
                bytes,
                error: e.to_string(),
            },
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_cookbook(&self) -> Option<&CookbookBundle> {
        match self {
            Self::Cookbook(bundle) => Some(bundle),
            _ => None,
        }
    }

    /// Bytes for a leaf. JSON is pretty-printed; cookbooks have no byte form.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Json(value) => Some(pretty_json(value).into_bytes()),
            Self::Raw(bytes) | Self::Unparsed { bytes, .. } => Some(bytes.clone()),
            Self::Cookbook(_) => None,
        }
    }
}

/// Pretty JSON with a trailing newline, keys in sorted order.
pub fn pretty_json(value: &Value) -> String {
    let mut text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    text.push('\n');
    text
}
