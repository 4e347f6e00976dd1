//! Recipes: declarative descriptions of one packageable component.
//!
//! A [`Recipe`] is immutable once loaded. Its version is resolved exactly
//! once by the loader; changing anything requires loading it again.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::build_info::ExportedInfo;
use crate::core::version::VersionReq;
use crate::error::{Error, Result};
use crate::util::fs::is_contained;
use crate::util::hash::Checksum;

static NAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.+\-]*$").ok());

/// Check a recipe or requirement name.
pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.as_ref().is_some_and(|re| re.is_match(name))
}

/// What kind of artifact a recipe packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageType {
    /// Headers only, consumed through include paths.
    HeaderOnly,
    /// Vendored sources plus headers, compiled by the consumer.
    SourceHeader,
    /// A pre-built binary distribution acquired from a remote artifact.
    PrebuiltBinary,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::HeaderOnly => "header-only",
            PackageType::SourceHeader => "source-header",
            PackageType::PrebuiltBinary => "prebuilt-binary",
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, PackageType::PrebuiltBinary)
    }
}

impl FromStr for PackageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "header-only" | "header-library" => Ok(PackageType::HeaderOnly),
            "source-header" | "static-library" | "source" => Ok(PackageType::SourceHeader),
            "prebuilt-binary" | "application" | "binary" => Ok(PackageType::PrebuiltBinary),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PackageType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One copy rule of a source manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRule {
    /// Glob matched against paths relative to `from`.
    pub pattern: String,
    /// Source subtree, relative to the recipe's source root.
    #[serde(default)]
    pub from: String,
    /// Destination subtree in the package.
    #[serde(default)]
    pub to: String,
    /// Keep the matched file's path below `from`; otherwise flatten to its file name.
    #[serde(default = "default_keep_path")]
    pub keep_path: bool,
}

fn default_keep_path() -> bool {
    true
}

impl CopyRule {
    pub fn new(pattern: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        CopyRule {
            pattern: pattern.into(),
            from: from.into(),
            to: to.into(),
            keep_path: true,
        }
    }

    pub fn flatten(mut self) -> Self {
        self.keep_path = false;
        self
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.pattern.trim().is_empty() {
            return Err("copy rule has an empty pattern".to_string());
        }
        glob::Pattern::new(&self.pattern)
            .map_err(|e| format!("invalid copy pattern `{}`: {}", self.pattern, e))?;
        for (field, value) in [("from", &self.from), ("to", &self.to)] {
            if !is_contained(Path::new(value)) {
                return Err(format!(
                    "copy rule `{}` path `{}` must stay inside the package",
                    field, value
                ));
            }
        }
        Ok(())
    }
}

/// A dependency on another recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub constraint: VersionReq,
}

impl Requirement {
    /// Parse `name`, `name/*`, `name/1.0.0` or `name/^1.0`.
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim();
        let (name, constraint) = match s.split_once('/') {
            Some((name, constraint)) => (name.trim(), VersionReq::parse(constraint)?),
            None => (s, VersionReq::Any),
        };
        if !is_valid_name(name) {
            return Err(format!("invalid requirement `{}`", s));
        }
        Ok(Requirement {
            name: name.to_string(),
            constraint,
        })
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraint.is_any() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.name, self.constraint)
        }
    }
}

/// A remote archive backing a prebuilt-binary recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArtifact {
    pub url: Url,
    pub checksum: Checksum,
    /// Leading path components removed from every archive entry.
    pub strip_root: usize,
}

impl RemoteArtifact {
    pub fn new(url: &str, checksum: &str, strip_root: usize) -> std::result::Result<Self, String> {
        let url = Url::parse(url).map_err(|e| format!("invalid url `{}`: {}", url, e))?;
        let checksum = checksum.parse()?;
        Ok(RemoteArtifact {
            url,
            checksum,
            strip_root,
        })
    }
}

/// Informational recipe metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecipeMetadata {
    pub description: Option<String>,
    pub license: Option<String>,
    pub homepage: Option<String>,
}

/// A loaded, validated recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    name: String,
    version: String,
    package_type: PackageType,
    source_dir: PathBuf,
    origin: PathBuf,
    copy_rules: Vec<CopyRule>,
    requirements: Vec<Requirement>,
    exports: ExportedInfo,
    remote: Option<RemoteArtifact>,
    metadata: RecipeMetadata,
}

impl Recipe {
    /// Start building a recipe in code.
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> RecipeBuilder {
        RecipeBuilder::new(name, version)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn package_type(&self) -> PackageType {
        self.package_type
    }

    /// Root of the recipe's source tree.
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// The file (or pseudo-path) this recipe was loaded from.
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub fn copy_rules(&self) -> &[CopyRule] {
        &self.copy_rules
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn exports(&self) -> &ExportedInfo {
        &self.exports
    }

    pub fn remote(&self) -> Option<&RemoteArtifact> {
        self.remote.as_ref()
    }

    pub fn metadata(&self) -> &RecipeMetadata {
        &self.metadata
    }

    /// `name/version`, used in logs and reports.
    pub fn id(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// Builder for [`Recipe`], used by the loader and by tests.
#[derive(Debug, Clone)]
pub struct RecipeBuilder {
    name: String,
    version: String,
    package_type: PackageType,
    source_dir: PathBuf,
    origin: Option<PathBuf>,
    copy_rules: Vec<CopyRule>,
    requirements: Vec<String>,
    exports: ExportedInfo,
    remote: Option<RemoteArtifact>,
    metadata: RecipeMetadata,
}

impl RecipeBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        RecipeBuilder {
            name: name.into(),
            version: version.into(),
            package_type: PackageType::HeaderOnly,
            source_dir: PathBuf::from("."),
            origin: None,
            copy_rules: Vec::new(),
            requirements: Vec::new(),
            exports: ExportedInfo::default(),
            remote: None,
            metadata: RecipeMetadata::default(),
        }
    }

    pub fn package_type(mut self, package_type: PackageType) -> Self {
        self.package_type = package_type;
        self
    }

    pub fn source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = dir.into();
        self
    }

    pub fn origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn copy(mut self, rule: CopyRule) -> Self {
        self.copy_rules.push(rule);
        self
    }

    pub fn requires(mut self, requirement: impl Into<String>) -> Self {
        self.requirements.push(requirement.into());
        self
    }

    pub fn exports(mut self, exports: ExportedInfo) -> Self {
        self.exports = exports;
        self
    }

    pub fn include_dir(mut self, dir: impl Into<String>) -> Self {
        self.exports.include_dirs.push(dir.into());
        self
    }

    pub fn executable(mut self, role: impl Into<String>, exe: impl Into<String>) -> Self {
        self.exports.executables.insert(role.into(), exe.into());
        self
    }

    pub fn remote(mut self, remote: RemoteArtifact) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn metadata(mut self, metadata: RecipeMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Validate and freeze the recipe.
    pub fn build(self) -> Result<Recipe> {
        let origin = self
            .origin
            .unwrap_or_else(|| self.source_dir.join(crate::core::manifest::RECIPE_FILE));
        let invalid = |message: String| Error::invalid_recipe(&origin, message);

        if self.name.trim().is_empty() {
            return Err(invalid("recipe name must not be empty".to_string()));
        }
        if !is_valid_name(&self.name) {
            return Err(invalid(format!("invalid recipe name `{}`", self.name)));
        }

        let version = self.version.trim().to_string();
        if version.is_empty() {
            return Err(Error::InvalidVersion {
                recipe: self.name,
                reason: "version is empty".to_string(),
            });
        }

        let mut requirements: Vec<Requirement> = Vec::with_capacity(self.requirements.len());
        for raw in &self.requirements {
            let req = Requirement::parse(raw).map_err(&invalid)?;
            if requirements.iter().any(|r| r.name == req.name) {
                return Err(invalid(format!("duplicate requirement `{}`", req.name)));
            }
            requirements.push(req);
        }

        for rule in &self.copy_rules {
            rule.validate().map_err(&invalid)?;
        }

        match (self.package_type.is_binary(), &self.remote) {
            (true, None) => {
                return Err(invalid(
                    "prebuilt-binary recipes need a [remote] artifact".to_string(),
                ))
            }
            (false, Some(_)) => {
                return Err(invalid(format!(
                    "[remote] is only allowed for prebuilt-binary recipes, not {}",
                    self.package_type
                )))
            }
            _ => {}
        }

        Ok(Recipe {
            name: self.name,
            version,
            package_type: self.package_type,
            source_dir: self.source_dir,
            origin,
            copy_rules: self.copy_rules,
            requirements,
            exports: self.exports,
            remote: self.remote,
            metadata: self.metadata,
        })
    }
}
