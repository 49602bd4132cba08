//! Cookbook bundles, metadata and version handling

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use semver::Version;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// What a file inside a cookbook is for, from its relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileRole {
    Attribute,
    Definition,
    File,
    Library,
    Metadata,
    Provider,
    Recipe,
    Resource,
    RootFile,
    Template,
}

impl FileRole {
    pub fn classify(relative: &str) -> Self {
        let Some((segment, _)) = relative.split_once('/') else {
            return if relative.starts_with("metadata.") {
                Self::Metadata
            } else {
                Self::RootFile
            };
        };
        match segment {
            "attributes" => Self::Attribute,
            "definitions" => Self::Definition,
            "libraries" => Self::Library,
            "providers" => Self::Provider,
            "recipes" => Self::Recipe,
            "resources" => Self::Resource,
            "templates" => Self::Template,
            _ => Self::File,
        }
    }

    /// Manifest section name used by the server.
    pub fn section(&self) -> &'static str {
        match self {
            Self::Attribute => "attributes",
            Self::Definition => "definitions",
            Self::File => "files",
            Self::Library => "libraries",
            Self::Metadata | Self::RootFile => "root_files",
            Self::Provider => "providers",
            Self::Recipe => "recipes",
            Self::Resource => "resources",
            Self::Template => "templates",
        }
    }
}

/// A whole cookbook version read or written as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookbookBundle {
    pub name: String,
    pub version: Version,
    /// File contents keyed by path relative to the cookbook root
    pub files: BTreeMap<String, Vec<u8>>,
    pub frozen: bool,
}

impl CookbookBundle {
    /// Build a bundle from files, taking name and version from metadata.
    ///
    /// `fallback_name` is used when metadata does not declare a name.
    pub fn from_files(fallback_name: &str, files: BTreeMap<String, Vec<u8>>) -> Self {
        let metadata = CookbookMetadata::from_files(&files);
        Self {
            name: metadata
                .name
                .clone()
                .unwrap_or_else(|| fallback_name.to_string()),
            version: metadata.version,
            files,
            frozen: false,
        }
    }

    pub fn metadata(&self) -> CookbookMetadata {
        CookbookMetadata::from_files(&self.files)
    }

    /// Same file set with the same contents. Frozen state is not compared.
    pub fn same_files(&self, other: &CookbookBundle) -> bool {
        self.files == other.files
    }

    /// Whether the cookbook lists itself among its dependencies.
    pub fn depends_on_itself(&self) -> bool {
        self.metadata().depends.iter().any(|dep| dep == &self.name)
    }

    /// `name-version` directory name used in versioned layouts.
    pub fn versioned_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// The subset of cookbook metadata the sync and deps engines need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookbookMetadata {
    pub name: Option<String>,
    pub version: Version,
    pub depends: Vec<String>,
}

impl Default for CookbookMetadata {
    fn default() -> Self {
        Self {
            name: None,
            version: Version::new(0, 0, 0),
            depends: Vec::new(),
        }
    }
}

impl CookbookMetadata {
    /// Prefer `metadata.json`, fall back to `metadata.rb`.
    pub fn from_files(files: &BTreeMap<String, Vec<u8>>) -> Self {
        if let Some(json) = files.get("metadata.json")
            && let Some(metadata) = Self::from_json(json)
        {
            return metadata;
        }
        files
            .get("metadata.rb")
            .map(|rb| Self::from_ruby(&String::from_utf8_lossy(rb)))
            .unwrap_or_default()
    }

    pub fn from_json(bytes: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(bytes).ok()?;
        let depends = value
            .get("dependencies")
            .and_then(Value::as_object)
            .map(|deps| deps.keys().cloned().collect())
            .unwrap_or_default();
        Some(Self {
            name: value.get("name").and_then(Value::as_str).map(str::to_string),
            version: value
                .get("version")
                .and_then(Value::as_str)
                .and_then(parse_version)
                .unwrap_or_else(|| Version::new(0, 0, 0)),
            depends,
        })
    }

    /// Read `name`, `version` and `depends` lines from a metadata.rb.
    ///
    /// Only literal string arguments are understood.
    pub fn from_ruby(text: &str) -> Self {
        let mut metadata = Self::default();
        for line in text.lines() {
            let Some(captures) = METADATA_LINE.captures(line) else {
                continue;
            };
            let value = captures[2].to_string();
            match &captures[1] {
                "name" => metadata.name = Some(value),
                "version" => {
                    if let Some(version) = parse_version(&value) {
                        metadata.version = version;
                    }
                }
                _ => {
                    if !metadata.depends.contains(&value) {
                        metadata.depends.push(value);
                    }
                }
            }
        }
        metadata
    }
}

static METADATA_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(name|version|depends)\s*\(?\s*['"]([^'"]+)['"]"#).unwrap()
});

/// Parse a cookbook version, accepting `1.0` as `1.0.0`.
pub fn parse_version(version: &str) -> Option<Version> {
    let version = version.trim();
    let parts = version.split('.').count();
    let padded = match parts {
        1 => format!("{}.0.0", version),
        2 => format!("{}.0", version),
        _ => version.to_string(),
    };
    Version::parse(&padded).ok()
}

/// Split `apache2-1.2.0` into name and version.
pub fn split_name_version(dir_name: &str) -> Option<(&str, Version)> {
    let (name, version) = dir_name.rsplit_once('-')?;
    if name.is_empty() {
        return None;
    }
    Some((name, parse_version(version)?))
}

/// The highest version in a set.
pub fn latest<'a>(versions: impl IntoIterator<Item = &'a Version>) -> Option<&'a Version> {
    versions.into_iter().max()
}

/// Hex SHA-256 of a file, the key files are stored under on the server.
pub fn checksum(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[rstest]
    #[case("recipes/default.rb", FileRole::Recipe)]
    #[case("templates/default/a.erb", FileRole::Template)]
    #[case("attributes/default.rb", FileRole::Attribute)]
    #[case("metadata.rb", FileRole::Metadata)]
    #[case("README.md", FileRole::RootFile)]
    #[case("spec/unit.rb", FileRole::File)]
    fn test_file_roles(#[case] path: &str, #[case] role: FileRole) {
        assert_eq!(FileRole::classify(path), role);
    }

    #[test]
    fn test_metadata_rb() {
        let text = concat!(
            "name 'apache2'\n",
            "version \"1.2\"\n",
            "depends 'iptables'\n",
            "depends \"logrotate\", '>= 1.0'\n",
            "# depends 'ignored'\n",
        );
        let metadata = CookbookMetadata::from_ruby(text);
        assert_eq!(metadata.name.as_deref(), Some("apache2"));
        assert_eq!(metadata.version, Version::new(1, 2, 0));
        assert_eq!(metadata.depends, vec!["iptables", "logrotate"]);
    }

    #[test]
    fn test_metadata_json_wins_over_rb() {
        let bundle = CookbookBundle::from_files(
            "x",
            files(&[
                ("metadata.rb", "name 'x'\nversion '1.0.0'\n"),
                (
                    "metadata.json",
                    r#"{"name":"x","version":"2.0.0","dependencies":{"y":">= 0.0.0"}}"#,
                ),
            ]),
        );
        assert_eq!(bundle.version, Version::new(2, 0, 0));
        assert_eq!(bundle.metadata().depends, vec!["y"]);
    }

    #[test]
    fn test_bundle_without_metadata_uses_fallback_name() {
        let bundle = CookbookBundle::from_files("x", files(&[("README.md", "hi")]));
        assert_eq!(bundle.name, "x");
        assert_eq!(bundle.version, Version::new(0, 0, 0));
        assert_eq!(bundle.versioned_name(), "x-0.0.0");
    }

    #[test]
    fn test_self_dependency() {
        let bundle = CookbookBundle::from_files(
            "self",
            files(&[("metadata.rb", "name 'self'\ndepends 'self'\n")]),
        );
        assert!(bundle.depends_on_itself());
    }

    #[rstest]
    #[case("apache2-1.2.0", Some(("apache2", "1.2.0")))]
    #[case("my-cookbook-0.1", Some(("my-cookbook", "0.1.0")))]
    #[case("apache2", None)]
    fn test_split_name_version(#[case] input: &str, #[case] expected: Option<(&str, &str)>) {
        let expected = expected.map(|(n, v)| (n, Version::parse(v).unwrap()));
        assert_eq!(split_name_version(input), expected);
    }

    #[test]
    fn test_latest_uses_semver_order() {
        let versions = [
            Version::new(1, 0, 0),
            Version::new(1, 10, 0),
            Version::new(1, 9, 0),
        ];
        assert_eq!(latest(&versions), Some(&Version::new(1, 10, 0)));
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        assert_eq!(
            checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
