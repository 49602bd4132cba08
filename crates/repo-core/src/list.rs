//! `knife-sync list`

use repo_tree::{ChefPath, ObjectTree, PathPattern};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// List directories below the matched ones too
    pub recursive: bool,
    /// Print full paths instead of `dir:` blocks
    pub flat: bool,
    /// Append `/` to containers
    pub dir_slash: bool,
}

#[derive(Debug, Default)]
pub struct ListReport {
    pub lines: Vec<String>,
    pub errors: Vec<repo_tree::Error>,
}

impl ListReport {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

struct Listed {
    path: ChefPath,
    is_dir: bool,
}

/// A container and its children.
struct Block {
    dir: ChefPath,
    children: Vec<Listed>,
}

/// List what the patterns match.
///
/// Leaves are printed as full paths. A single matched directory prints its
/// children as full paths; several print one `dir:` block each, with
/// child names only.
pub fn list(tree: &dyn ObjectTree, patterns: &[PathPattern], options: &ListOptions) -> ListReport {
    let mut report = ListReport::default();
    let mut results = Vec::new();
    let mut blocks = Vec::new();

    for pattern in patterns {
        let paths = match pattern.expand(&[tree]) {
            Ok(paths) => paths,
            Err(e) => {
                report.errors.push(e);
                continue;
            }
        };
        for path in paths {
            match tree.kind(&path) {
                Ok(Some(kind)) if kind.is_container() => {
                    blocks.extend(collect_blocks(tree, path, options.recursive, &mut report));
                }
                Ok(Some(_)) => results.push(Listed {
                    path,
                    is_dir: false,
                }),
                Ok(None) => report.errors.push(repo_tree::Error::not_found(&path)),
                Err(e) => report.errors.push(e),
            }
        }
    }

    if options.flat {
        for block in blocks.drain(..) {
            results.extend(block.children);
        }
    }
    results.sort_by(|a, b| a.path.cmp(&b.path));
    results.dedup_by(|a, b| a.path == b.path);
    blocks.sort_by(|a, b| a.dir.cmp(&b.dir));
    blocks.dedup_by(|a, b| a.dir == b.dir);

    let entry_line = |listed: &Listed, text: String| {
        if options.dir_slash && listed.is_dir {
            format!("{}/", text)
        } else {
            text
        }
    };

    if results.is_empty() && blocks.len() == 1 {
        for child in &blocks[0].children {
            report.lines.push(entry_line(child, child.path.to_string()));
        }
        return report;
    }

    for result in &results {
        report.lines.push(entry_line(result, result.path.to_string()));
    }
    let mut printed = !results.is_empty();
    for block in &blocks {
        if printed {
            report.lines.push(String::new());
        }
        printed = true;
        report.lines.push(format!("{}:", block.dir));
        for child in &block.children {
            let name = child.path.name().unwrap_or_default().to_string();
            report.lines.push(entry_line(child, name));
        }
    }
    report
}

/// The block for `dir` and, when recursive, for every directory below it.
fn collect_blocks(
    tree: &dyn ObjectTree,
    dir: ChefPath,
    recursive: bool,
    report: &mut ListReport,
) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut stack = vec![dir];
    while let Some(dir) = stack.pop() {
        let names = match tree.list(&dir) {
            Ok(names) => names,
            Err(e) => {
                report.errors.push(e);
                continue;
            }
        };
        let mut children = Vec::new();
        for name in names {
            let path = dir.join(&name);
            match tree.is_container(&path) {
                Ok(is_dir) => children.push(Listed { path, is_dir }),
                Err(e) => report.errors.push(e),
            }
        }
        if recursive {
            stack.extend(
                children
                    .iter()
                    .rev()
                    .filter(|child| child.is_dir)
                    .map(|child| child.path.clone()),
            );
        }
        blocks.push(Block { dir, children });
    }
    blocks
}
