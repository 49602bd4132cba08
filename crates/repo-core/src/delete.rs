//! `knife-sync delete`: removing paths from the server, the repository or both

use std::fmt;

use repo_tree::{ChefPath, ObjectTree, PathPattern, Side};

/// Which backends a delete touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeleteSides {
    #[default]
    Remote,
    Local,
    Both,
}

impl DeleteSides {
    pub fn includes(&self, side: Side) -> bool {
        match self {
            Self::Remote => side == Side::Remote,
            Self::Local => side == Side::Local,
            Self::Both => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub sides: DeleteSides,
    pub recursive: bool,
}

#[derive(Debug)]
pub enum DeleteOutcome {
    /// At least one side deleted the path
    Deleted(ChefPath),
    /// No selected side had the path
    NotFound(ChefPath),
    Failed {
        path: ChefPath,
        side: Side,
        error: repo_tree::Error,
    },
}

impl DeleteOutcome {
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Deleted(_))
    }
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deleted(path) => write!(f, "Deleted {}", path),
            Self::NotFound(path) => write!(f, "{}: No such file or directory", path),
            Self::Failed { path, side, error } => match error.refusal() {
                Some(reason) => write!(f, "{} ({}) {}", path, side, reason),
                None => write!(f, "{} ({}) {}", path, side, error),
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct DeleteReport {
    pub outcomes: Vec<DeleteOutcome>,
}

impl DeleteReport {
    pub fn success(&self) -> bool {
        !self.outcomes.iter().any(DeleteOutcome::is_failure)
    }
}

/// Delete every path the patterns expand to on the selected trees.
///
/// `trees` may hold both backends; the ones `options.sides` excludes are
/// ignored. The remote side is always tried before the local one, and a
/// failure on one side does not stop the other.
pub fn delete(
    trees: &[&dyn ObjectTree],
    patterns: &[PathPattern],
    options: &DeleteOptions,
) -> DeleteReport {
    let mut selected: Vec<&dyn ObjectTree> = trees
        .iter()
        .copied()
        .filter(|tree| options.sides.includes(tree.side()))
        .collect();
    selected.sort_by_key(|tree| match tree.side() {
        Side::Remote => 0,
        Side::Local => 1,
    });

    let mut report = DeleteReport::default();
    for pattern in patterns {
        let paths = match pattern.expand(&selected) {
            Ok(paths) => paths,
            Err(e) => {
                report.outcomes.push(DeleteOutcome::Failed {
                    path: pattern.as_path().clone(),
                    side: selected.first().map_or(Side::Remote, |tree| tree.side()),
                    error: e,
                });
                continue;
            }
        };
        for path in paths {
            delete_path(&selected, &path, options.recursive, &mut report);
        }
    }
    report
}

fn delete_path(
    trees: &[&dyn ObjectTree],
    path: &ChefPath,
    recursive: bool,
    report: &mut DeleteReport,
) {
    let mut found = false;
    let mut deleted = false;
    for tree in trees {
        let side = tree.side();
        let result = match tree.exists(path) {
            Ok(false) => continue,
            Ok(true) => {
                found = true;
                tree.delete(path, recursive)
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                tracing::debug!(path = %path, side = %side, "deleted");
                deleted = true;
            }
            Err(e) => {
                found = true;
                report.outcomes.push(DeleteOutcome::Failed {
                    path: path.clone(),
                    side,
                    error: e,
                });
            }
        }
    }

    if deleted {
        report.outcomes.push(DeleteOutcome::Deleted(path.clone()));
    } else if !found {
        report.outcomes.push(DeleteOutcome::NotFound(path.clone()));
    }
}
