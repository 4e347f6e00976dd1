//! Packaging engine.
//!
//! [`collect`] interprets a recipe's copy rules against a [`SourceTree`]
//! without touching the output; [`Packager`] then materializes the planned
//! tree and swaps it into the package directory in one rename.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::core::recipe::{CopyRule, Recipe};
use crate::error::{Error, Result};
use crate::sources::tree::{SourceTree, VirtualTree};
use crate::util::fs::{ensure_dir, join_slash, remove_dir_all_if_exists};

/// `*` crosses directory separators, so `*.h` matches headers at any depth.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// The planned output of one recipe: destination path -> source path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTree {
    files: BTreeMap<String, String>,
}

impl OutputTree {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// `(destination, source)` pairs in destination order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(d, s)| (d.as_str(), s.as_str()))
    }

    pub fn source_of(&self, destination: &str) -> Option<&str> {
        self.files.get(destination).map(String::as_str)
    }

    /// Files grouped by their top-level directory (`""` for files at the root).
    pub fn subtrees(&self) -> BTreeMap<String, Vec<String>> {
        let mut subtrees: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for dest in self.files.keys() {
            let top = match dest.split_once('/') {
                Some((top, _)) => top.to_string(),
                None => String::new(),
            };
            subtrees.entry(top).or_default().push(dest.clone());
        }
        subtrees
    }

    /// Read every planned file into memory.
    pub fn render(&self, tree: &dyn SourceTree) -> Result<VirtualTree> {
        let mut out = VirtualTree::new();
        for (dest, src) in &self.files {
            out.insert(dest.clone(), tree.read(src)?);
        }
        Ok(out)
    }
}

/// Run a recipe's copy rules, in declared order, against `tree`.
///
/// A rule matching nothing is fine. Two rules writing the same destination
/// must agree on its content, otherwise this is a [`Error::CopyConflict`].
pub fn collect(recipe: &Recipe, tree: &dyn SourceTree) -> Result<OutputTree> {
    let files = tree.files()?;
    let mut output = OutputTree::default();

    for rule in recipe.copy_rules() {
        let matched = apply_rule(recipe, rule, &files, tree, &mut output)?;
        tracing::debug!(
            "{}: rule `{}` from `{}` matched {} file(s)",
            recipe.name(),
            rule.pattern,
            rule.from,
            matched
        );
    }

    Ok(output)
}

/// Convenience for callers that want the packaged bytes rather than a plan.
pub fn package(recipe: &Recipe, tree: &dyn SourceTree) -> Result<VirtualTree> {
    collect(recipe, tree)?.render(tree)
}

fn apply_rule(
    recipe: &Recipe,
    rule: &CopyRule,
    files: &[String],
    tree: &dyn SourceTree,
    output: &mut OutputTree,
) -> Result<usize> {
    let pattern = Pattern::new(&rule.pattern).map_err(|e| {
        Error::invalid_recipe(
            recipe.origin(),
            format!("invalid copy pattern `{}`: {}", rule.pattern, e),
        )
    })?;
    let from = normalize_subtree(&rule.from);
    let to = normalize_subtree(&rule.to);

    let mut matched = 0;
    for file in files {
        let relative = if from.is_empty() {
            file.as_str()
        } else {
            match file.strip_prefix(from.as_str()).and_then(|r| r.strip_prefix('/')) {
                Some(relative) => relative,
                None => continue,
            }
        };
        if !pattern.matches_with(relative, MATCH_OPTIONS) {
            continue;
        }
        matched += 1;

        let placed = if rule.keep_path {
            relative
        } else {
            relative.rsplit('/').next().unwrap_or(relative)
        };
        let destination = join_slash(&to, placed);

        match output.files.get(&destination) {
            None => {
                output.files.insert(destination, file.clone());
            }
            Some(existing) if existing == file => {}
            Some(existing) => {
                if tree.digest(existing)? != tree.digest(file)? {
                    return Err(Error::CopyConflict {
                        recipe: recipe.name().to_string(),
                        destination,
                        first: existing.clone(),
                        second: file.clone(),
                    });
                }
                tracing::debug!(
                    "{}: `{}` and `{}` are identical, keeping the first for `{}`",
                    recipe.name(),
                    existing,
                    file,
                    destination
                );
            }
        }
    }
    Ok(matched)
}

/// Drop empty and `.` segments so `"./Inc/"` and `"Inc"` name the same subtree.
fn normalize_subtree(path: &str) -> String {
    path.split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Writes planned output trees into package directories.
#[derive(Debug, Default, Clone, Copy)]
pub struct Packager;

impl Packager {
    /// Copy every planned file into a staging directory beside
    /// `package_dir`, then replace `package_dir` with it.
    ///
    /// On failure the staging directory is dropped and any existing
    /// package directory is left as it was.
    pub fn materialize(
        &self,
        tree: &dyn SourceTree,
        output: &OutputTree,
        package_dir: &Path,
    ) -> Result<PathBuf> {
        let parent = package_dir.parent().ok_or_else(|| {
            Error::io(
                format!("package directory {} has no parent", package_dir.display()),
                std::io::Error::from(std::io::ErrorKind::InvalidInput),
            )
        })?;
        ensure_dir(parent)?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)
            .map_err(|e| {
                Error::io(
                    format!("failed to create staging directory in {}", parent.display()),
                    e,
                )
            })?;

        for (dest, src) in output.iter() {
            let target = staging.path().join(dest);
            if let Some(dir) = target.parent() {
                ensure_dir(dir)?;
            }
            tree.copy_to(src, &target)?;
        }

        remove_dir_all_if_exists(package_dir)?;
        std::fs::rename(staging.path(), package_dir).map_err(|e| {
            Error::io(
                format!("failed to move package into {}", package_dir.display()),
                e,
            )
        })?;
        drop(staging);

        Ok(package_dir.to_path_buf())
    }
}
