//! Packaging fingerprints for incremental builds.
//!
//! A fingerprint captures every input of a packaging step, so a package
//! directory whose fingerprint still matches can be left alone.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::builder::package::OutputTree;
use crate::core::recipe::Recipe;
use crate::error::{Error, Result};
use crate::sources::tree::SourceTree;
use crate::util::fs::write_string;
use crate::util::hash::Fingerprint as HashFingerprint;

/// Fingerprint of one packaged recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFingerprint {
    /// `name/version`
    pub recipe: String,

    /// Digest over the recipe's rules and the planned files.
    pub digest: String,

    /// Number of files in the package.
    pub files: usize,
}

impl PackageFingerprint {
    /// Fingerprint the packaging of `recipe` from `tree` into `output`.
    ///
    /// Content-addressed trees contribute their identity instead of
    /// per-file digests, so acquired toolchains are never rehashed.
    pub fn compute(recipe: &Recipe, tree: &dyn SourceTree, output: &OutputTree) -> Result<Self> {
        let mut fp = HashFingerprint::new();
        fp.update_str(recipe.name())
            .update_str(recipe.version())
            .update_str(recipe.package_type().as_str());
        for rule in recipe.copy_rules() {
            fp.update_str(&rule.pattern)
                .update_str(&rule.from)
                .update_str(&rule.to)
                .update_bool(rule.keep_path);
        }

        let identity = tree.identity();
        fp.update_opt(identity.as_deref());
        for (dest, src) in output.iter() {
            fp.update_str(dest);
            if identity.is_none() {
                fp.update_str(&tree.digest(src)?);
            }
        }

        Ok(PackageFingerprint {
            recipe: recipe.id(),
            digest: fp.finish(),
            files: output.len(),
        })
    }
}

/// Fingerprints on disk, one JSON file per recipe name.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    dir: PathBuf,
}

impl FingerprintStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FingerprintStore { dir: dir.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    /// Load the stored fingerprint for a recipe. Unreadable entries count
    /// as missing.
    pub fn load(&self, name: &str) -> Option<PackageFingerprint> {
        let content = std::fs::read_to_string(self.path(name)).ok()?;
        match serde_json::from_str(&content) {
            Ok(fp) => Some(fp),
            Err(e) => {
                tracing::warn!("ignoring corrupt fingerprint for `{}`: {}", name, e);
                None
            }
        }
    }

    pub fn save(&self, name: &str, fingerprint: &PackageFingerprint) -> Result<()> {
        let content = serde_json::to_string_pretty(fingerprint)
            .map_err(|e| Error::io("failed to serialize fingerprint", std::io::Error::other(e)))?;
        write_string(&self.path(name), &content)
    }

    /// Forget a recipe's fingerprint, forcing the next build to repackage it.
    pub fn invalidate(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(format!("failed to remove {}", path.display()), e)),
        }
    }

    /// True when `package_dir` exists and was produced from identical inputs.
    pub fn is_fresh(&self, name: &str, current: &PackageFingerprint, package_dir: &Path) -> bool {
        package_dir.is_dir() && self.load(name).as_ref() == Some(current)
    }
}
