//! Applying a diff to the destination tree
//!
//! Upload and download are the same walk with the trees swapped: the
//! differ classifies every path, then each entry is turned into a
//! create, update or (with purge) delete on the destination. A failure on
//! one path is recorded and the walk moves on; only a cookbook that
//! depends on itself stops the batch.

use repo_tree::{
    ChefPath, Content, EntryKind, Layout, ObjectTree, PathPattern, Refusal, WriteOptions,
};

use super::report::{SyncEvent, SyncReport};
use crate::Result;
use crate::diff::{
    DiffEntry, DiffItem, DiffOptions, DiffStatus, Differ, could_hold, holdable_bundle,
};
use crate::error::Error;

/// Options for upload and download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Delete destination entries the source does not have
    pub purge: bool,
    pub recurse: bool,
    /// Update entries that exist on both sides
    pub diff: bool,
    /// Rewrite without comparing, overwriting frozen cookbooks
    pub force: bool,
    /// Mark uploaded cookbooks frozen
    pub freeze: bool,
    /// Report what would change without changing it
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            purge: false,
            recurse: true,
            diff: true,
            force: false,
            freeze: false,
            dry_run: false,
        }
    }
}

/// Copies the state of a source tree onto a destination tree.
pub struct SyncEngine<'a> {
    source: &'a dyn ObjectTree,
    destination: &'a dyn ObjectTree,
    layout: Layout,
    options: SyncOptions,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        source: &'a dyn ObjectTree,
        destination: &'a dyn ObjectTree,
        layout: Layout,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            destination,
            layout,
            options,
        }
    }

    /// Sync every path the patterns expand to.
    ///
    /// # Errors
    ///
    /// Returns `Error::SelfDependency` if a cookbook about to be uploaded
    /// depends on itself. Every other failure is an event in the report.
    pub fn run(&self, patterns: &[PathPattern]) -> Result<SyncReport> {
        let differ = Differ::new(
            self.source,
            self.destination,
            self.layout,
            DiffOptions {
                recurse: self.options.recurse,
                unit_aware: true,
                compare_content: self.options.diff && !self.options.force,
            },
        );

        let mut report = SyncReport::default();
        for item in differ.diff(patterns).items {
            match item {
                DiffItem::Change(entry) => self.apply(&entry, &mut report)?,
                DiffItem::Warning(message) => report.push(SyncEvent::Warning(message)),
                DiffItem::Error(error) => fail(error, &mut report),
                DiffItem::Missing(path) => fail(repo_tree::Error::not_found(&path), &mut report),
            }
        }
        Ok(report)
    }

    fn write_options(&self) -> WriteOptions {
        WriteOptions {
            force: self.options.force,
            freeze: self.options.freeze,
        }
    }

    fn apply(&self, entry: &DiffEntry, report: &mut SyncReport) -> Result<()> {
        tracing::debug!(path = %entry.path, status = ?entry.status, "applying");
        match entry.status {
            DiffStatus::Added => {
                if self.create_parents(&entry.path, report) {
                    self.create(&entry.path, report)?;
                }
            }
            DiffStatus::Modified if self.options.diff => self.update(&entry.path, report)?,
            DiffStatus::TypeChanged if self.options.diff => self.replace(&entry.path, report)?,
            DiffStatus::Deleted if self.options.purge => self.purge(&entry.path, report),
            _ => {}
        }
        Ok(())
    }

    /// Create missing destination ancestors. Returns false if one failed.
    fn create_parents(&self, path: &ChefPath, report: &mut SyncReport) -> bool {
        for ancestor in path.ancestors() {
            match self.destination.exists(&ancestor) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    fail(e, report);
                    return false;
                }
            }
            if self.options.dry_run {
                let event = SyncEvent::WouldCreate(ancestor);
                if !report.events.contains(&event) {
                    report.push(event);
                }
                continue;
            }
            let Some((parent, name)) = split(&ancestor) else {
                continue;
            };
            match self
                .destination
                .create_child(&parent, name, None, &self.write_options())
            {
                Ok(()) => report.push(SyncEvent::Created(ancestor.clone())),
                Err(e) => {
                    fail(e, report);
                    return false;
                }
            }
        }
        true
    }

    /// Create `path` and, for plain containers, everything below it.
    fn create(&self, path: &ChefPath, report: &mut SyncReport) -> Result<()> {
        if self.options.dry_run {
            report.push(SyncEvent::WouldCreate(path.clone()));
            return Ok(());
        }

        let mut stack = vec![path.clone()];
        while let Some(current) = stack.pop() {
            let kind = match self.source.kind(&current) {
                Ok(Some(kind)) => kind,
                Ok(None) => continue,
                Err(e) => {
                    fail(e, report);
                    continue;
                }
            };
            if current != *path && !could_hold(self.destination, &current, kind) {
                continue;
            }
            if kind == EntryKind::Leaf || self.destination.copies_as_unit(&current) {
                self.create_one(&current, report)?;
                continue;
            }

            let Some((parent, name)) = split(&current) else {
                continue;
            };
            if let Err(e) = self
                .destination
                .create_child(&parent, name, None, &self.write_options())
            {
                fail(e, report);
                continue;
            }
            report.push(SyncEvent::Created(current.clone()));

            if current == *path || self.options.recurse {
                match self.source.list(&current) {
                    Ok(children) => {
                        stack.extend(children.iter().rev().map(|child| current.join(child)))
                    }
                    Err(e) => fail(e, report),
                }
            }
        }
        Ok(())
    }

    /// Create a leaf or a whole cookbook from the source content.
    fn create_one(&self, path: &ChefPath, report: &mut SyncReport) -> Result<()> {
        let Some((parent, name)) = split(path) else {
            return Ok(());
        };
        let content = match self.read_source(path) {
            Ok(content) => content,
            Err(e) => {
                fail(e, report);
                return Ok(());
            }
        };
        check_self_dependency(&content)?;
        match self
            .destination
            .create_child(&parent, name, Some(&content), &self.write_options())
        {
            Ok(()) => report.push(SyncEvent::Created(path.clone())),
            Err(e) => fail(e, report),
        }
        Ok(())
    }

    fn update(&self, path: &ChefPath, report: &mut SyncReport) -> Result<()> {
        if self.options.dry_run {
            report.push(SyncEvent::WouldUpdate(path.clone()));
            return Ok(());
        }
        let content = match self.read_source(path) {
            Ok(content) => content,
            Err(e) => {
                fail(e, report);
                return Ok(());
            }
        };
        check_self_dependency(&content)?;
        match self
            .destination
            .update(path, &content, &self.write_options())
        {
            Ok(()) => report.push(SyncEvent::Updated(path.clone())),
            Err(e) => fail(e, report),
        }
        Ok(())
    }

    /// A container on one side and a leaf on the other: replace it.
    fn replace(&self, path: &ChefPath, report: &mut SyncReport) -> Result<()> {
        if self.options.dry_run {
            report.push(SyncEvent::WouldUpdate(path.clone()));
            return Ok(());
        }
        if let Err(e) = self.destination.delete(path, true) {
            fail(e, report);
            return Ok(());
        }
        self.create(path, report)
    }

    fn purge(&self, path: &ChefPath, report: &mut SyncReport) {
        if self.options.dry_run {
            report.push(SyncEvent::WouldDelete(path.clone()));
            return;
        }
        match self.destination.delete(path, self.options.recurse) {
            Ok(()) => report.push(SyncEvent::Deleted(path.clone())),
            Err(e) => fail(e, report),
        }
    }

    /// Source content, with cookbooks cut down to what the destination holds.
    fn read_source(&self, path: &ChefPath) -> repo_tree::Result<Content> {
        Ok(match self.source.read(path)? {
            Content::Cookbook(bundle) => {
                Content::Cookbook(holdable_bundle(self.destination, path, &bundle))
            }
            other => other,
        })
    }
}

fn check_self_dependency(content: &Content) -> Result<()> {
    if let Content::Cookbook(bundle) = content
        && bundle.depends_on_itself()
    {
        return Err(Error::SelfDependency {
            cookbook: bundle.name.clone(),
        });
    }
    Ok(())
}

/// Record a per-path failure. The default environment only warns.
fn fail(error: repo_tree::Error, report: &mut SyncReport) {
    let message = error.to_string();
    match error.refusal() {
        Some(Refusal::DefaultEnvironment { .. }) => report.push(SyncEvent::Warning(message)),
        _ => report.push(SyncEvent::Error(message)),
    }
}

fn split(path: &ChefPath) -> Option<(ChefPath, &str)> {
    Some((path.parent()?, path.name()?))
}
