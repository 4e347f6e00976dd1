//! Core data model: recipes, versions, build-info and the workspace.

pub mod build_info;
pub mod manifest;
pub mod recipe;
pub mod version;
pub mod workspace;

pub use build_info::{BuildInfo, EnvEdit, EnvOp, ExportedInfo, FlagCategory};
pub use manifest::{load_recipe, parse_recipe, RECIPE_FILE};
pub use recipe::{CopyRule, PackageType, Recipe, RecipeBuilder, RemoteArtifact, Requirement};
pub use version::{satisfies, VersionReq};
pub use workspace::{Workspace, WORKSPACE_FILE};
