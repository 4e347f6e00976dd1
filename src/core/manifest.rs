//! recipe.toml parsing and validation.
//!
//! The loader turns one recipe file into a [`Recipe`]. It resolves the
//! version descriptor, validates the package type and every declared field,
//! and never copies files or touches the network.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::build_info::ExportedInfo;
use crate::core::recipe::{CopyRule, PackageType, Recipe, RecipeMetadata, RemoteArtifact};
use crate::error::{Error, Result};

/// File name of a recipe inside its directory.
pub const RECIPE_FILE: &str = "recipe.toml";

/// Raw recipe as deserialized from TOML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRecipe {
    package: RawPackage,

    #[serde(default)]
    copy: Vec<CopyRule>,

    #[serde(default)]
    remote: Option<RawRemote>,

    #[serde(default)]
    exports: ExportedInfo,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackage {
    name: String,

    version: Option<VersionDescriptor>,

    #[serde(rename = "type")]
    package_type: String,

    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    license: Option<String>,

    #[serde(default, alias = "url")]
    homepage: Option<String>,

    /// Source root relative to the recipe directory.
    #[serde(default)]
    source: Option<PathBuf>,

    #[serde(default)]
    requires: Vec<String>,
}

/// Where a recipe's version comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum VersionDescriptor {
    /// The version written inline.
    Literal(String),
    /// The trimmed contents of a file next to the recipe.
    File { file: PathBuf },
}

impl VersionDescriptor {
    /// Resolve the descriptor to a version string.
    pub fn resolve(&self, recipe: &str, recipe_dir: &Path) -> Result<String> {
        let raw = match self {
            VersionDescriptor::Literal(v) => v.clone(),
            VersionDescriptor::File { file } => {
                let path = recipe_dir.join(file);
                std::fs::read_to_string(&path).map_err(|e| Error::InvalidVersion {
                    recipe: recipe.to_string(),
                    reason: format!("cannot read {}: {}", path.display(), e),
                })?
            }
        };

        let version = raw.trim();
        if version.is_empty() {
            return Err(Error::InvalidVersion {
                recipe: recipe.to_string(),
                reason: match self {
                    VersionDescriptor::Literal(_) => "version is empty".to_string(),
                    VersionDescriptor::File { file } => {
                        format!("{} is empty", file.display())
                    }
                },
            });
        }
        Ok(version.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRemote {
    url: String,
    checksum: String,
    #[serde(default)]
    strip_root: usize,
}

/// Load the recipe in `path`, which may be a recipe file or its directory.
pub fn load_recipe(path: &Path) -> Result<Recipe> {
    let file = if path.is_dir() {
        path.join(RECIPE_FILE)
    } else {
        path.to_path_buf()
    };
    let content = std::fs::read_to_string(&file)
        .map_err(|e| Error::invalid_recipe(&file, format!("cannot read recipe: {}", e)))?;
    parse_recipe(&content, &file)
}

/// Parse recipe content that was read from `path`.
pub fn parse_recipe(content: &str, path: &Path) -> Result<Recipe> {
    let raw: RawRecipe = toml::from_str(content)
        .map_err(|e| Error::invalid_recipe(path, format!("failed to parse recipe: {}", e)))?;
    let recipe_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let pkg = raw.package;

    if pkg.name.trim().is_empty() {
        return Err(Error::invalid_recipe(path, "recipe name must not be empty"));
    }

    let version = match &pkg.version {
        Some(descriptor) => descriptor.resolve(&pkg.name, &recipe_dir)?,
        None => {
            return Err(Error::InvalidVersion {
                recipe: pkg.name,
                reason: "no version descriptor".to_string(),
            })
        }
    };

    let package_type: PackageType =
        pkg.package_type
            .parse()
            .map_err(|found| Error::UnknownPackageType {
                recipe: pkg.name.clone(),
                found,
            })?;

    let source_dir = match &pkg.source {
        Some(source) => {
            if !crate::util::fs::is_contained(source) {
                return Err(Error::invalid_recipe(
                    path,
                    format!("source `{}` must stay inside the recipe", source.display()),
                ));
            }
            recipe_dir.join(source)
        }
        None => recipe_dir.clone(),
    };

    let mut builder = Recipe::builder(pkg.name.clone(), version)
        .package_type(package_type)
        .source_dir(source_dir)
        .origin(path)
        .exports(raw.exports)
        .metadata(RecipeMetadata {
            description: pkg.description,
            license: pkg.license,
            homepage: pkg.homepage,
        });

    for requirement in pkg.requires {
        builder = builder.requires(requirement);
    }
    for rule in raw.copy {
        builder = builder.copy(rule);
    }
    if let Some(remote) = raw.remote {
        let remote = RemoteArtifact::new(&remote.url, &remote.checksum, remote.strip_root)
            .map_err(|e| Error::invalid_recipe(path, e))?;
        builder = builder.remote(remote);
    }

    let recipe = builder.build()?;
    tracing::debug!("loaded recipe {} from {}", recipe.id(), path.display());
    Ok(recipe)
}
