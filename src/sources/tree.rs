//! Source trees the packaging engine copies from.
//!
//! Paths handed across this trait are always relative and `/`-separated,
//! whatever the platform.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::util::fs::{is_contained, walk_files};
use crate::util::hash::{sha256_bytes, sha256_file, Checksum};

/// A readable tree of files.
pub trait SourceTree: Send + Sync {
    /// Every file in the tree, sorted.
    fn files(&self) -> Result<Vec<String>>;

    /// Read one file.
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Write one file to `dest`. The parent directory already exists.
    fn copy_to(&self, path: &str, dest: &Path) -> Result<()> {
        let data = self.read(path)?;
        std::fs::write(dest, data)
            .map_err(|e| Error::io(format!("failed to write {}", dest.display()), e))
    }

    /// SHA-256 of one file.
    fn digest(&self, path: &str) -> Result<String> {
        Ok(sha256_bytes(&self.read(path)?))
    }

    /// Identity of the whole tree when it is already content-addressed.
    fn identity(&self) -> Option<String> {
        None
    }

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// A tree on disk.
#[derive(Debug, Clone)]
pub struct FsTree {
    root: PathBuf,
    identity: Option<String>,
}

impl FsTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsTree {
            root: root.into(),
            identity: None,
        }
    }

    /// A tree extracted from a verified artifact.
    pub fn acquired(root: impl Into<PathBuf>, checksum: &Checksum, strip: usize) -> Self {
        FsTree {
            root: root.into(),
            identity: Some(format!("{}/strip-{}", checksum, strip)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if !is_contained(Path::new(path)) {
            return Err(Error::io(
                format!("refusing to read `{}` outside {}", path, self.root.display()),
                std::io::Error::from(std::io::ErrorKind::InvalidInput),
            ));
        }
        Ok(self.root.join(path))
    }
}

impl SourceTree for FsTree {
    fn files(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(Error::io(
                format!("source directory {} does not exist", self.root.display()),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        walk_files(&self.root)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        std::fs::read(&full).map_err(|e| Error::io(format!("failed to read {}", full.display()), e))
    }

    fn copy_to(&self, path: &str, dest: &Path) -> Result<()> {
        let full = self.resolve(path)?;
        std::fs::copy(&full, dest).map_err(|e| {
            Error::io(
                format!("failed to copy {} to {}", full.display(), dest.display()),
                e,
            )
        })?;
        Ok(())
    }

    fn digest(&self, path: &str) -> Result<String> {
        sha256_file(&self.resolve(path)?)
    }

    fn identity(&self) -> Option<String> {
        self.identity.clone()
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// An in-memory tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualTree {
    files: BTreeMap<String, Vec<u8>>,
}

impl VirtualTree {
    pub fn new() -> Self {
        VirtualTree::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl SourceTree for VirtualTree {
    fn files(&self) -> Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            Error::io(
                format!("no file `{}` in virtual tree", path),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )
        })
    }

    fn describe(&self) -> String {
        format!("<virtual tree with {} files>", self.files.len())
    }
}
