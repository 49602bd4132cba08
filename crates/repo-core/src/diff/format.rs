//! Rendering diff entries for `knife-sync diff`
//!
//! `old` is the tree being compared against (the server for `diff`) and
//! `new` the tree holding the proposed state (the repository).

use std::collections::BTreeSet;

use similar::TextDiff;

use repo_tree::entry::pretty_json;
use repo_tree::objects;
use repo_tree::{ChefPath, Content, Layout, ObjectTree};

use super::differ::{DiffEntry, DiffStatus, object_identity};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiffFormat {
    /// Unified text diff
    #[default]
    Patch,
    NameOnly,
    NameStatus,
}

/// `--diff-filter` selection, with git's conventions: upper-case letters
/// select statuses, lower-case letters exclude them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffFilter {
    include: BTreeSet<char>,
    exclude: BTreeSet<char>,
}

impl DiffFilter {
    pub fn parse(spec: &str) -> Result<Self> {
        let mut filter = Self::default();
        for letter in spec.chars() {
            match letter {
                'A' | 'D' | 'M' | 'T' => {
                    filter.include.insert(letter);
                }
                'a' | 'd' | 'm' | 't' => {
                    filter.exclude.insert(letter.to_ascii_uppercase());
                }
                other => {
                    return Err(Error::Usage(format!(
                        "Invalid --diff-filter letter '{}': expected one of A, D, M, T",
                        other
                    )));
                }
            }
        }
        Ok(filter)
    }

    pub fn allows(&self, status: DiffStatus) -> bool {
        let letter = status.letter();
        (self.include.is_empty() || self.include.contains(&letter))
            && !self.exclude.contains(&letter)
    }
}

/// A `--name-only` or `--name-status` line.
pub fn name_line(entry: &DiffEntry, format: DiffFormat) -> String {
    match format {
        DiffFormat::NameStatus => format!("{}\t{}", entry.status.letter(), entry.path),
        _ => entry.path.to_string(),
    }
}

/// Text diff for one entry, ending in a newline.
pub fn patch(
    entry: &DiffEntry,
    old: &dyn ObjectTree,
    new: &dyn ObjectTree,
    layout: &Layout,
) -> Result<String> {
    let path = &entry.path;
    let old_name = format!("a{}", path);
    let new_name = format!("b{}", path);
    let is_container = |kind: Option<repo_tree::EntryKind>| kind.is_some_and(|k| k.is_container());

    let text = match entry.status {
        DiffStatus::Added if is_container(entry.source) => only_in(new, path),
        DiffStatus::Deleted if is_container(entry.destination) => only_in(old, path),
        DiffStatus::TypeChanged => {
            let (old_type, new_type) = if is_container(entry.destination) {
                ("a directory", "a regular file")
            } else {
                ("a regular file", "a directory")
            };
            format!(
                "File {} is {} while file {} is {}\n",
                old.display_path(path),
                old_type,
                new.display_path(path),
                new_type
            )
        }
        _ if entry.unit => format!("Cookbooks {} and {} differ\n", old_name, new_name),
        DiffStatus::Added => {
            let body = leaf_text(new, path, layout)?;
            file_diff(&old_name, &new_name, None, Some(&body), "new file")
        }
        DiffStatus::Deleted => {
            let body = leaf_text(old, path, layout)?;
            file_diff(&old_name, &new_name, Some(&body), None, "deleted file")
        }
        DiffStatus::Modified => {
            let old_body = leaf_text(old, path, layout)?;
            let new_body = leaf_text(new, path, layout)?;
            file_diff(&old_name, &new_name, Some(&old_body), Some(&new_body), "")
        }
    };
    Ok(text)
}

fn only_in(tree: &dyn ObjectTree, path: &ChefPath) -> String {
    let parent = path.parent().unwrap_or_else(ChefPath::root);
    format!(
        "Only in {}: {}\n",
        tree.display_path(&parent),
        path.name().unwrap_or_default()
    )
}

/// Printable text of a leaf, or `None` for binary content.
enum LeafText {
    Text(String),
    Binary,
}

fn leaf_text(tree: &dyn ObjectTree, path: &ChefPath, layout: &Layout) -> Result<LeafText> {
    let text = match tree.read(path)? {
        Content::Json(value) => match object_identity(layout, path) {
            Some((kind, name)) => LeafText::Text(pretty_json(&objects::minimize(
                kind, &name, &value,
            ))),
            None => LeafText::Text(pretty_json(&value)),
        },
        other => {
            let bytes = other.to_bytes().unwrap_or_default();
            match String::from_utf8(bytes) {
                Ok(text) if !text.contains('\0') => LeafText::Text(text),
                _ => LeafText::Binary,
            }
        }
    };
    Ok(text)
}

fn file_diff(
    old_name: &str,
    new_name: &str,
    old: Option<&LeafText>,
    new: Option<&LeafText>,
    note: &str,
) -> String {
    let mut out = format!("diff --knife {} {}\n", old_name, new_name);
    if !note.is_empty() {
        out.push_str(note);
        out.push('\n');
    }

    let old_header = if old.is_some() { old_name } else { "/dev/null" };
    let new_header = if new.is_some() { new_name } else { "/dev/null" };
    fn text(side: Option<&LeafText>) -> Option<&str> {
        match side {
            Some(LeafText::Text(text)) => Some(text.as_str()),
            Some(LeafText::Binary) => None,
            None => Some(""),
        }
    }

    match (text(old), text(new)) {
        (Some(old_text), Some(new_text)) => {
            let diff = TextDiff::from_lines(old_text, new_text);
            out.push_str(
                &diff
                    .unified_diff()
                    .context_radius(3)
                    .header(old_header, new_header)
                    .to_string(),
            );
        }
        _ => out.push_str(&format!("Binary files {} and {} differ\n", old_header, new_header)),
    }
    out
}
