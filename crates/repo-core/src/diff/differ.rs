//! Pairwise walk of a source and a destination tree

use std::collections::BTreeSet;

use repo_tree::objects::{self, ObjectKind};
use repo_tree::{
    ChefPath, Content, CookbookBundle, EntryKind, Layout, Location, ObjectTree, PathPattern,
};

/// Flags that shape a diff walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    /// Descend below the children of each start path
    pub recurse: bool,
    /// Compare whole cookbooks where the destination only writes them whole
    pub unit_aware: bool,
    /// When false, leaves present on both sides count as modified unread
    pub compare_content: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            recurse: true,
            unit_aware: false,
            compare_content: true,
        }
    }
}

/// How a path differs between source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffStatus {
    /// Only in the source
    Added,
    /// Only in the destination
    Deleted,
    Modified,
    /// A container on one side and a leaf on the other
    TypeChanged,
}

impl DiffStatus {
    /// The `--name-status` letter.
    pub fn letter(&self) -> char {
        match self {
            Self::Added => 'A',
            Self::Deleted => 'D',
            Self::Modified => 'M',
            Self::TypeChanged => 'T',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub path: ChefPath,
    pub status: DiffStatus,
    pub source: Option<EntryKind>,
    pub destination: Option<EntryKind>,
    /// Compared as one cookbook rather than file by file
    pub unit: bool,
}

/// One item of a diff, in traversal order.
#[derive(Debug)]
pub enum DiffItem {
    Change(DiffEntry),
    Warning(String),
    Error(repo_tree::Error),
    /// An exact start path that neither side has
    Missing(ChefPath),
}

#[derive(Debug, Default)]
pub struct DiffReport {
    pub items: Vec<DiffItem>,
}

impl DiffReport {
    pub fn changes(&self) -> impl Iterator<Item = &DiffEntry> {
        self.items.iter().filter_map(|item| match item {
            DiffItem::Change(entry) => Some(entry),
            _ => None,
        })
    }

    /// Whether any path failed or was missing.
    pub fn has_errors(&self) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, DiffItem::Error(_) | DiffItem::Missing(_)))
    }

    fn push(&mut self, path: &ChefPath, status: DiffStatus, kinds: Kinds, unit: bool) {
        self.items.push(DiffItem::Change(DiffEntry {
            path: path.clone(),
            status,
            source: kinds.0,
            destination: kinds.1,
            unit,
        }));
    }
}

type Kinds = (Option<EntryKind>, Option<EntryKind>);

struct Pending {
    path: ChefPath,
    descend: bool,
    start: bool,
}

/// Walks two trees side by side and classifies every differing path.
pub struct Differ<'a> {
    source: &'a dyn ObjectTree,
    destination: &'a dyn ObjectTree,
    layout: Layout,
    options: DiffOptions,
}

impl<'a> Differ<'a> {
    pub fn new(
        source: &'a dyn ObjectTree,
        destination: &'a dyn ObjectTree,
        layout: Layout,
        options: DiffOptions,
    ) -> Self {
        Self {
            source,
            destination,
            layout,
            options,
        }
    }

    /// Diff every path the patterns expand to, in pattern order.
    pub fn diff(&self, patterns: &[PathPattern]) -> DiffReport {
        let mut report = DiffReport::default();
        let mut walked = BTreeSet::new();
        let trees = [self.source, self.destination];

        for pattern in patterns {
            let paths = match pattern.expand(&trees) {
                Ok(paths) => paths,
                Err(e) => {
                    report.items.push(DiffItem::Error(e));
                    continue;
                }
            };
            for path in paths {
                let start = self.unit_root(&path);
                if walked.insert(start.clone()) {
                    self.walk(start, &mut report);
                }
            }
        }
        report
    }

    /// The enclosing path the destination writes as a whole, if any.
    fn unit_root(&self, path: &ChefPath) -> ChefPath {
        if !self.options.unit_aware {
            return path.clone();
        }
        path.ancestors()
            .into_iter()
            .chain(std::iter::once(path.clone()))
            .find(|candidate| self.destination.copies_as_unit(candidate))
            .unwrap_or_else(|| path.clone())
    }

    fn walk(&self, start: ChefPath, report: &mut DiffReport) {
        let mut stack = vec![Pending {
            path: start,
            descend: true,
            start: true,
        }];

        while let Some(pending) = stack.pop() {
            let path = &pending.path;
            tracing::debug!(path = %path, "comparing");
            let kinds = match self.kinds(path) {
                Ok(kinds) => kinds,
                Err(e) => {
                    report.items.push(DiffItem::Error(e));
                    continue;
                }
            };

            match kinds {
                (None, None) => {
                    if pending.start {
                        report.items.push(DiffItem::Missing(path.clone()));
                    }
                }
                (Some(EntryKind::Container), None) | (None, Some(EntryKind::Container))
                    if self.layout.locate(path).is_system() =>
                {
                    // Top-level collections exist implicitly on both sides
                    if pending.descend {
                        self.push_children(path, kinds, &mut stack, report);
                    }
                }
                (Some(kind), None) => {
                    if could_hold(self.destination, path, kind) {
                        report.push(path, DiffStatus::Added, kinds, self.is_unit(path));
                    }
                }
                (None, Some(kind)) => {
                    if could_hold(self.source, path, kind) {
                        report.push(path, DiffStatus::Deleted, kinds, self.is_unit(path));
                    }
                }
                (Some(source), Some(destination))
                    if source.is_container() != destination.is_container() =>
                {
                    report.push(path, DiffStatus::TypeChanged, kinds, false);
                }
                (Some(EntryKind::Container), Some(_)) => {
                    if self.is_unit(path) {
                        if self.units_differ(path, report) {
                            report.push(path, DiffStatus::Modified, kinds, true);
                        }
                    } else if pending.descend {
                        self.push_children(path, kinds, &mut stack, report);
                    }
                }
                (Some(_), Some(_)) => {
                    if self.leaves_differ(path, report) {
                        report.push(path, DiffStatus::Modified, kinds, false);
                    }
                }
            }
        }
    }

    fn kinds(&self, path: &ChefPath) -> repo_tree::Result<Kinds> {
        Ok((self.source.kind(path)?, self.destination.kind(path)?))
    }

    fn is_unit(&self, path: &ChefPath) -> bool {
        self.options.unit_aware && self.destination.copies_as_unit(path)
    }

    fn push_children(
        &self,
        path: &ChefPath,
        kinds: Kinds,
        stack: &mut Vec<Pending>,
        report: &mut DiffReport,
    ) {
        let mut names = BTreeSet::new();
        for (tree, kind) in [(self.source, kinds.0), (self.destination, kinds.1)] {
            if kind != Some(EntryKind::Container) {
                continue;
            }
            match tree.list(path) {
                Ok(children) => names.extend(children),
                Err(e) => report.items.push(DiffItem::Error(e)),
            }
        }
        for name in names.into_iter().rev() {
            stack.push(Pending {
                path: path.join(&name),
                descend: self.options.recurse,
                start: false,
            });
        }
    }

    fn read_pair(
        &self,
        path: &ChefPath,
        report: &mut DiffReport,
    ) -> Option<(Content, Content)> {
        let source = self.source.read(path);
        let destination = self.destination.read(path);
        match (source, destination) {
            (Ok(source), Ok(destination)) => Some((source, destination)),
            (Err(e), _) | (_, Err(e)) => {
                report.items.push(DiffItem::Error(e));
                None
            }
        }
    }

    fn leaves_differ(&self, path: &ChefPath, report: &mut DiffReport) -> bool {
        if !self.options.compare_content {
            return true;
        }
        let Some((source, destination)) = self.read_pair(path, report) else {
            return false;
        };

        let mut unparsed = false;
        for (tree, content) in [(self.source, &source), (self.destination, &destination)] {
            if let Content::Unparsed { error, .. } = content {
                report.items.push(DiffItem::Warning(format!(
                    "Parse error reading {} as JSON: {}",
                    tree.display_path(path),
                    error
                )));
                unparsed = true;
            }
        }
        if unparsed {
            return true;
        }

        match (&source, &destination) {
            (Content::Json(left), Content::Json(right)) => {
                match object_identity(&self.layout, path) {
                    Some((kind, name)) => !objects::objects_equal(kind, &name, left, right),
                    None => left != right,
                }
            }
            _ => source.to_bytes() != destination.to_bytes(),
        }
    }

    fn units_differ(&self, path: &ChefPath, report: &mut DiffReport) -> bool {
        if !self.options.compare_content {
            return true;
        }
        let Some((source, destination)) = self.read_pair(path, report) else {
            return false;
        };
        match (source.as_cookbook(), destination.as_cookbook()) {
            (Some(source), Some(destination)) => {
                let source = holdable_bundle(self.destination, path, source);
                let destination = holdable_bundle(self.source, path, destination);
                !source.same_files(&destination)
            }
            _ => source != destination,
        }
    }
}

/// Whether `tree` would accept `path` with the given kind.
pub(crate) fn could_hold(tree: &dyn ObjectTree, path: &ChefPath, kind: EntryKind) -> bool {
    match (path.parent(), path.name()) {
        (Some(parent), Some(name)) => tree.can_have_child(&parent, name, kind.is_container()),
        _ => true,
    }
}

/// The JSON kind and object name stored at `path`, if it is a document.
pub fn object_identity(layout: &Layout, path: &ChefPath) -> Option<(ObjectKind, String)> {
    match layout.locate(path) {
        Location::Object { kind, name } => Some((kind, name)),
        Location::Singleton(kind) => {
            let name = path.name()?.trim_end_matches(".json").to_string();
            Some((kind, name))
        }
        _ => None,
    }
}

/// The part of `bundle` that `tree` could hold under the cookbook at `root`.
///
/// Every segment of each file path is checked, so a file inside a
/// directory the tree refuses is dropped along with it.
pub fn holdable_bundle(
    tree: &dyn ObjectTree,
    root: &ChefPath,
    bundle: &CookbookBundle,
) -> CookbookBundle {
    let files = bundle
        .files
        .iter()
        .filter(|(relative, _)| can_hold_file(tree, root, relative))
        .map(|(relative, bytes)| (relative.clone(), bytes.clone()))
        .collect();
    CookbookBundle {
        name: bundle.name.clone(),
        version: bundle.version.clone(),
        files,
        frozen: bundle.frozen,
    }
}

fn can_hold_file(tree: &dyn ObjectTree, root: &ChefPath, relative: &str) -> bool {
    let segments: Vec<&str> = relative.split('/').collect();
    let mut parent = root.clone();
    for (index, segment) in segments.iter().enumerate() {
        let is_container = index + 1 < segments.len();
        if !tree.can_have_child(&parent, segment, is_container) {
            return false;
        }
        parent = parent.join(segment);
    }
    true
}
