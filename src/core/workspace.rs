//! Workspace - central configuration hub.
//!
//! A Workspace is a `Keel.toml` file listing recipe directories, the
//! optional consumer whose build-info is the final output, and where
//! packages are laid out.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::manifest::{load_recipe, RECIPE_FILE};
use crate::core::recipe::Recipe;
use crate::error::{Error, Result};
use crate::util::fs::glob_dirs;

/// Name of the workspace file.
pub const WORKSPACE_FILE: &str = "Keel.toml";

/// Default package output directory, relative to the workspace root.
pub const DEFAULT_OUTPUT_DIR: &str = ".keel/packages";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWorkspaceFile {
    workspace: RawWorkspace,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWorkspace {
    #[serde(default)]
    members: Vec<String>,

    #[serde(default)]
    consumer: Option<String>,

    #[serde(default)]
    output_dir: Option<PathBuf>,
}

/// A loaded workspace.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    manifest_path: PathBuf,
    member_patterns: Vec<String>,
    consumer: Option<String>,
    output_dir: PathBuf,
}

impl Workspace {
    /// Load a workspace from its `Keel.toml`.
    pub fn load(manifest_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(manifest_path).map_err(|e| {
            Error::io(
                format!("failed to read workspace: {}", manifest_path.display()),
                e,
            )
        })?;
        Self::parse(&content, manifest_path)
    }

    /// Parse workspace content read from `manifest_path`.
    pub fn parse(content: &str, manifest_path: &Path) -> Result<Self> {
        let raw: RawWorkspaceFile = toml::from_str(content).map_err(|e| {
            Error::invalid_recipe(manifest_path, format!("failed to parse workspace: {}", e))
        })?;

        let root = manifest_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let output_dir = root.join(
            raw.workspace
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        );

        Ok(Workspace {
            root,
            manifest_path: manifest_path.to_path_buf(),
            member_patterns: raw.workspace.members,
            consumer: raw.workspace.consumer,
            output_dir,
        })
    }

    /// Use a different package output directory (relative paths are rooted at the workspace).
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = self.root.join(dir);
        self
    }

    /// Get the workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// The recipe whose composed build-info is the final output, if named.
    pub fn consumer(&self) -> Option<&str> {
        self.consumer.as_deref()
    }

    /// Root of the package layout.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the build plan report.
    pub fn plan_path(&self) -> PathBuf {
        self.output_dir.join("keel-plan.json")
    }

    /// Path of the final build-info report.
    pub fn build_info_path(&self) -> PathBuf {
        self.output_dir.join("keel-buildinfo.json")
    }

    /// Directories of every member that holds a recipe.
    pub fn member_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for dir in glob_dirs(&self.root, &self.member_patterns)? {
            if dir.join(RECIPE_FILE).is_file() {
                dirs.push(dir);
            } else {
                tracing::debug!("skipping {}: no {}", dir.display(), RECIPE_FILE);
            }
        }

        for pattern in &self.member_patterns {
            let literal = !pattern.contains(['*', '?', '[']);
            if literal && !self.root.join(pattern).join(RECIPE_FILE).is_file() {
                return Err(Error::invalid_recipe(
                    &self.manifest_path,
                    format!("member `{}` has no {}", pattern, RECIPE_FILE),
                ));
            }
        }
        Ok(dirs)
    }

    /// Load every member recipe, sorted by name.
    pub fn load_recipes(&self) -> Result<Vec<Recipe>> {
        let mut recipes = self
            .member_dirs()?
            .iter()
            .map(|dir| load_recipe(dir))
            .collect::<Result<Vec<_>>>()?;
        recipes.sort_by(|a, b| a.name().cmp(b.name()));
        tracing::debug!("loaded {} recipes", recipes.len());
        Ok(recipes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn header_recipe(name: &str) -> String {
        format!(
            "[package]\nname = \"{}\"\nversion = \"1.0.0\"\ntype = \"header-only\"\n",
            name
        )
    }

    #[test]
    fn test_workspace_defaults() {
        let ws = Workspace::parse("[workspace]\n", Path::new("/ws/Keel.toml")).unwrap();
        assert_eq!(ws.root(), Path::new("/ws"));
        assert_eq!(ws.output_dir(), Path::new("/ws/.keel/packages"));
        assert!(ws.consumer().is_none());
        assert_eq!(
            ws.plan_path(),
            Path::new("/ws/.keel/packages/keel-plan.json")
        );
    }

    #[test]
    fn test_load_recipes_from_globbed_members() {
        let tmp = TempDir::new().unwrap();
        write(
            &tmp.path().join(WORKSPACE_FILE),
            r#"
[workspace]
members = ["cmsis", "drivers/*"]
consumer = "firmware"
output_dir = "build/keel"
"#,
        );
        write(&tmp.path().join("cmsis/recipe.toml"), &header_recipe("cmsis"));
        write(
            &tmp.path().join("drivers/hal/recipe.toml"),
            &header_recipe("hal"),
        );
        std::fs::create_dir_all(tmp.path().join("drivers/docs")).unwrap();

        let ws = Workspace::load(&tmp.path().join(WORKSPACE_FILE)).unwrap();
        assert_eq!(ws.consumer(), Some("firmware"));
        assert_eq!(ws.output_dir(), tmp.path().join("build/keel"));

        let recipes = ws.load_recipes().unwrap();
        let names: Vec<_> = recipes.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["cmsis", "hal"]);
    }

    #[test]
    fn test_literal_member_without_recipe_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write(
            &tmp.path().join(WORKSPACE_FILE),
            "[workspace]\nmembers = [\"missing\"]\n",
        );

        let ws = Workspace::load(&tmp.path().join(WORKSPACE_FILE)).unwrap();
        assert!(matches!(
            ws.load_recipes(),
            Err(Error::InvalidRecipe { .. })
        ));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = Workspace::parse(
            "[workspace]\nmembres = []\n",
            Path::new("/ws/Keel.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRecipe { .. }));
    }
}
