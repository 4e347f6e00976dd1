//! Build-info records.
//!
//! [`ExportedInfo`] is what a recipe declares in its `[exports]` table,
//! relative to its own package directory. [`BuildInfo`] is the rooted,
//! merged record a consumer compiles and links against. Every keyed value in
//! a `BuildInfo` remembers the recipe that defined it so conflicts can name
//! both sides.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator used when prepending or appending to path-list variables.
#[cfg(windows)]
pub const PATH_LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const PATH_LIST_SEPARATOR: char = ':';

/// Compiler flag categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagCategory {
    C,
    Cxx,
    Asm,
    Link,
}

impl FlagCategory {
    pub const ALL: [FlagCategory; 4] = [
        FlagCategory::C,
        FlagCategory::Cxx,
        FlagCategory::Asm,
        FlagCategory::Link,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlagCategory::C => "c",
            FlagCategory::Cxx => "cxx",
            FlagCategory::Asm => "asm",
            FlagCategory::Link => "link",
        }
    }
}

impl fmt::Display for FlagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an environment edit combines with the existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvOp {
    Prepend,
    Append,
    Set,
}

/// One ordered edit to an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvEdit {
    pub var: String,
    pub op: EnvOp,
    pub value: String,
    /// The value is a path relative to the package directory.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub path: bool,
}

impl EnvEdit {
    pub fn new(var: impl Into<String>, op: EnvOp, value: impl Into<String>) -> Self {
        EnvEdit {
            var: var.into(),
            op,
            value: value.into(),
            path: false,
        }
    }
}

/// Per-category flags as written in a recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportedFlags {
    pub c: Vec<String>,
    pub cxx: Vec<String>,
    pub asm: Vec<String>,
    pub link: Vec<String>,
}

impl ExportedFlags {
    pub fn get(&self, category: FlagCategory) -> &[String] {
        match category {
            FlagCategory::C => &self.c,
            FlagCategory::Cxx => &self.cxx,
            FlagCategory::Asm => &self.asm,
            FlagCategory::Link => &self.link,
        }
    }

    pub fn get_mut(&mut self, category: FlagCategory) -> &mut Vec<String> {
        match category {
            FlagCategory::C => &mut self.c,
            FlagCategory::Cxx => &mut self.cxx,
            FlagCategory::Asm => &mut self.asm,
            FlagCategory::Link => &mut self.link,
        }
    }
}

/// Build information a recipe exports to its consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportedInfo {
    pub include_dirs: Vec<String>,
    pub source_dirs: Vec<String>,
    pub lib_dirs: Vec<String>,
    /// Tool role (`c`, `cpp`, `ar`, ...) to executable.
    pub executables: BTreeMap<String, String>,
    pub flags: ExportedFlags,
    pub env: Vec<EnvEdit>,
    /// Executable roles and environment variables this recipe may redefine.
    pub overrides: Vec<String>,
}

impl ExportedInfo {
    /// Root this declaration at `package_dir`, producing the recipe's own record.
    pub fn resolve(&self, recipe: &str, package_dir: &Path) -> Result<BuildInfo> {
        let mut own = BuildInfo::default();
        own.include_dirs = root_paths(package_dir, &self.include_dirs);
        own.source_dirs = root_paths(package_dir, &self.source_dirs);
        own.lib_dirs = root_paths(package_dir, &self.lib_dirs);
        dedup_in_place(&mut own.include_dirs);
        dedup_in_place(&mut own.source_dirs);
        dedup_in_place(&mut own.lib_dirs);

        for (role, exe) in &self.executables {
            own.compiler_executables.insert(role.clone(), exe.clone());
            own.provenance
                .executables
                .insert(role.clone(), recipe.to_string());
        }

        // A recipe's own flags are kept verbatim, repeats included.
        for category in FlagCategory::ALL {
            let flags = self.flags.get(category);
            if !flags.is_empty() {
                own.flags.insert(category, flags.to_vec());
            }
        }

        for edit in &self.env {
            let mut rooted = edit.clone();
            if rooted.path {
                rooted.value = root_path(package_dir, &rooted.value)
                    .to_string_lossy()
                    .into_owned();
                rooted.path = false;
            }
            own.push_env(rooted, recipe, recipe, &[])?;
        }

        Ok(own)
    }
}

/// The merged build environment of one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub include_dirs: Vec<PathBuf>,
    pub source_dirs: Vec<PathBuf>,
    pub lib_dirs: Vec<PathBuf>,
    pub compiler_executables: BTreeMap<String, String>,
    pub flags: BTreeMap<FlagCategory, Vec<String>>,
    pub env_edits: Vec<EnvEdit>,
    #[serde(skip)]
    provenance: Provenance,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Provenance {
    executables: BTreeMap<String, String>,
    env_set: BTreeMap<String, String>,
}

impl BuildInfo {
    /// Merge a dependency's record into this one.
    ///
    /// Sequences are concatenated keeping first occurrences. A scalar that is
    /// already defined may only be redefined to the same value.
    pub fn merge(&mut self, other: &BuildInfo, consumer: &str) -> Result<()> {
        self.absorb(other, consumer, &[])
    }

    /// Overlay a recipe's own record on top of what it inherited.
    ///
    /// Keys listed in `overrides` replace inherited values instead of
    /// conflicting with them.
    pub fn overlay(&mut self, own: &BuildInfo, recipe: &str, overrides: &[String]) -> Result<()> {
        self.absorb(own, recipe, overrides)
    }

    fn absorb(&mut self, other: &BuildInfo, consumer: &str, overrides: &[String]) -> Result<()> {
        extend_unique(&mut self.include_dirs, &other.include_dirs);
        extend_unique(&mut self.source_dirs, &other.source_dirs);
        extend_unique(&mut self.lib_dirs, &other.lib_dirs);

        for (role, exe) in &other.compiler_executables {
            let origin = other.executable_origin(role).unwrap_or(consumer);
            match self.compiler_executables.get(role).cloned() {
                Some(existing) if &existing == exe => {}
                Some(existing) if !overrides.iter().any(|o| o == role) => {
                    return Err(Error::ConflictingDefinition {
                        consumer: consumer.to_string(),
                        key: format!("compiler executable `{}`", role),
                        existing,
                        existing_origin: self
                            .executable_origin(role)
                            .unwrap_or("<unknown>")
                            .to_string(),
                        value: exe.clone(),
                        origin: origin.to_string(),
                    });
                }
                _ => {
                    self.compiler_executables.insert(role.clone(), exe.clone());
                    self.provenance
                        .executables
                        .insert(role.clone(), origin.to_string());
                }
            }
        }

        for (category, flags) in &other.flags {
            extend_unique_flags(self.flags.entry(*category).or_default(), flags);
        }

        for edit in &other.env_edits {
            let origin = match edit.op {
                EnvOp::Set => other.provenance.env_set.get(&edit.var).map(String::as_str),
                _ => None,
            }
            .unwrap_or(consumer);
            self.push_env(edit.clone(), origin, consumer, overrides)?;
        }

        Ok(())
    }

    fn push_env(
        &mut self,
        edit: EnvEdit,
        origin: &str,
        consumer: &str,
        overrides: &[String],
    ) -> Result<()> {
        if self.env_edits.contains(&edit) {
            return Ok(());
        }

        if edit.op == EnvOp::Set {
            let existing = self
                .env_edits
                .iter()
                .find(|e| e.var == edit.var && e.op == EnvOp::Set)
                .map(|e| e.value.clone());
            if let Some(existing) = existing {
                if !overrides.iter().any(|o| o == &edit.var) {
                    return Err(Error::ConflictingDefinition {
                        consumer: consumer.to_string(),
                        key: format!("environment variable `{}`", edit.var),
                        existing,
                        existing_origin: self
                            .provenance
                            .env_set
                            .get(&edit.var)
                            .cloned()
                            .unwrap_or_else(|| "<unknown>".to_string()),
                        value: edit.value,
                        origin: origin.to_string(),
                    });
                }
                self.env_edits
                    .retain(|e| !(e.var == edit.var && e.op == EnvOp::Set));
            }
            self.provenance
                .env_set
                .insert(edit.var.clone(), origin.to_string());
        }

        self.env_edits.push(edit);
        Ok(())
    }

    /// The recipe that defined a compiler executable role.
    pub fn executable_origin(&self, role: &str) -> Option<&str> {
        self.provenance.executables.get(role).map(String::as_str)
    }

    pub fn flags(&self, category: FlagCategory) -> &[String] {
        self.flags.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.include_dirs.is_empty()
            && self.source_dirs.is_empty()
            && self.lib_dirs.is_empty()
            && self.compiler_executables.is_empty()
            && self.flags.values().all(Vec::is_empty)
            && self.env_edits.is_empty()
    }

    /// Apply the env edits, in order, to `base`.
    ///
    /// Only variables touched by an edit are returned.
    pub fn environment(&self, base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        for edit in &self.env_edits {
            let current = env
                .get(&edit.var)
                .or_else(|| base.get(&edit.var))
                .cloned()
                .unwrap_or_default();
            let value = match edit.op {
                EnvOp::Set => edit.value.clone(),
                EnvOp::Prepend if current.is_empty() => edit.value.clone(),
                EnvOp::Append if current.is_empty() => edit.value.clone(),
                EnvOp::Prepend => format!("{}{}{}", edit.value, PATH_LIST_SEPARATOR, current),
                EnvOp::Append => format!("{}{}{}", current, PATH_LIST_SEPARATOR, edit.value),
            };
            env.insert(edit.var.clone(), value);
        }
        env
    }
}

fn root_path(package_dir: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else if value.is_empty() || value == "." {
        package_dir.to_path_buf()
    } else {
        package_dir.join(path)
    }
}

fn root_paths(package_dir: &Path, values: &[String]) -> Vec<PathBuf> {
    values.iter().map(|v| root_path(package_dir, v)).collect()
}

fn extend_unique<T: PartialEq + Clone>(target: &mut Vec<T>, items: &[T]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

/// Options whose argument is the next token, as in `-Xlinker --gc-sections`.
const SEPARATE_ARG_FLAGS: &[&str] = &[
    "-Xlinker",
    "-Xassembler",
    "-Xpreprocessor",
    "-include",
    "-imacros",
    "-isystem",
    "-idirafter",
    "-iquote",
    "-I",
    "-D",
    "-U",
    "-L",
    "-l",
    "-T",
    "-u",
    "-x",
    "-MF",
    "-MT",
    "-MQ",
];

/// Split a flag list into units: an option together with its separate
/// argument, or a single token.
fn flag_units(flags: &[String]) -> Vec<&[String]> {
    let mut units = Vec::new();
    let mut i = 0;
    while i < flags.len() {
        let len = if SEPARATE_ARG_FLAGS.contains(&flags[i].as_str()) && i + 1 < flags.len() {
            2
        } else {
            1
        };
        units.push(&flags[i..i + len]);
        i += len;
    }
    units
}

/// Append the units of `items` that `target` does not already contain.
fn extend_unique_flags(target: &mut Vec<String>, items: &[String]) {
    let mut seen: Vec<Vec<String>> = flag_units(target).into_iter().map(<[String]>::to_vec).collect();
    for unit in flag_units(items) {
        if !seen.iter().any(|s| s.as_slice() == unit) {
            target.extend_from_slice(unit);
            seen.push(unit.to_vec());
        }
    }
}

fn dedup_in_place<T: PartialEq + Clone>(items: &mut Vec<T>) {
    let mut unique = Vec::with_capacity(items.len());
    extend_unique(&mut unique, items);
    *items = unique;
}
