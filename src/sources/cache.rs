//! Content-addressed artifact cache.
//!
//! Layout:
//!
//! ```text
//! <root>/
//!   .staging/                     in-progress downloads, same filesystem as entries
//!   sha256/<digest>/strip-<n>/
//!     entry.json                  written before promotion; marks the entry complete
//!     tree/                       extracted contents
//! ```
//!
//! An entry is keyed by the verified digest and the strip level, so it never
//! needs invalidation: the same key always names the same bytes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::util::fs::{dir_size, ensure_dir, remove_dir_all_if_exists};
use crate::util::hash::{Checksum, HashAlgorithm};

const MARKER_FILE: &str = "entry.json";
const TREE_DIR: &str = "tree";
const STAGING_DIR: &str = ".staging";

/// Identity of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub algorithm: HashAlgorithm,
    pub digest: String,
    pub strip: usize,
}

impl CacheKey {
    pub fn new(checksum: &Checksum, strip: usize) -> Self {
        CacheKey {
            algorithm: checksum.algorithm(),
            digest: checksum.digest().to_string(),
            strip,
        }
    }

    fn relative_dir(&self) -> PathBuf {
        PathBuf::from(self.algorithm.name())
            .join(&self.digest)
            .join(format!("strip-{}", self.strip))
    }
}

/// Metadata stored alongside each completed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMarker {
    pub url: String,
    pub algorithm: HashAlgorithm,
    pub digest: String,
    pub strip_root: usize,
    pub download_size: u64,
    pub files: usize,
}

/// A completed entry, as reported by [`ArtifactCache::list`].
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub marker: EntryMarker,
    pub path: PathBuf,
    pub size: u64,
}

/// Outcome of the first acquisition of a key within this session.
pub(crate) type Outcome = Option<Result<PathBuf>>;

/// Per-key lock. A failed outcome is kept only while requesters that
/// arrived during the attempt are still waiting; the last one to leave
/// clears it so a later request retries.
#[derive(Debug, Default)]
pub(crate) struct Slot {
    outcome: Mutex<Outcome>,
    waiters: AtomicUsize,
}

impl Slot {
    /// Register as a requester and lock the outcome.
    pub(crate) fn enter(&self) -> MutexGuard<'_, Outcome> {
        self.waiters.fetch_add(1, Ordering::SeqCst);
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deregister while still holding the outcome lock.
    pub(crate) fn leave(&self, outcome: &mut Outcome) {
        let last = self.waiters.fetch_sub(1, Ordering::SeqCst) == 1;
        if last && matches!(outcome, Some(Err(_))) {
            *outcome = None;
        }
    }
}

/// Handle to an on-disk artifact cache.
///
/// The handle also serializes work per key: callers enter the key's slot
/// before touching the entry, and the slot remembers the outcome.
#[derive(Debug)]
pub struct ArtifactCache {
    root: PathBuf,
    slots: Mutex<HashMap<CacheKey, Arc<Slot>>>,
}

impl ArtifactCache {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        ArtifactCache {
            root: root.into(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_dir())
    }

    /// Extracted tree of a complete entry, if present.
    pub fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        let dir = self.entry_dir(key);
        let tree = dir.join(TREE_DIR);
        (dir.join(MARKER_FILE).is_file() && tree.is_dir()).then_some(tree)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lookup(key).is_some()
    }

    /// The per-key slot. Holding its guard serializes work on the key.
    pub(crate) fn slot(&self, key: &CacheKey) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key.clone()).or_default().clone()
    }

    /// A fresh staging directory inside the cache root.
    pub fn staging(&self) -> Result<TempDir> {
        let dir = self.root.join(STAGING_DIR);
        ensure_dir(&dir)?;
        tempfile::Builder::new()
            .prefix("entry-")
            .tempdir_in(&dir)
            .map_err(|e| Error::io(format!("failed to create staging directory in {}", dir.display()), e))
    }

    /// Path of the extracted tree inside a staging directory.
    pub fn staging_tree(staging: &TempDir) -> PathBuf {
        staging.path().join(TREE_DIR)
    }

    /// Write the marker and atomically move a staged entry into place.
    ///
    /// If another process promoted the same key first, the staged copy is
    /// discarded and the existing entry is returned.
    pub fn promote(&self, staging: TempDir, key: &CacheKey, marker: &EntryMarker) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(marker).map_err(|e| {
            Error::io("failed to serialize cache marker", std::io::Error::other(e))
        })?;
        let marker_path = staging.path().join(MARKER_FILE);
        std::fs::write(&marker_path, json)
            .map_err(|e| Error::io(format!("failed to write {}", marker_path.display()), e))?;

        let dest = self.entry_dir(key);
        if let Some(parent) = dest.parent() {
            ensure_dir(parent)?;
        }

        match std::fs::rename(staging.path(), &dest) {
            Ok(()) => {
                tracing::debug!("promoted cache entry {}", dest.display());
            }
            Err(_) if self.contains(key) => {
                tracing::debug!("cache entry {} already promoted, discarding ours", dest.display());
            }
            Err(e) => {
                return Err(Error::io(
                    format!("failed to promote cache entry to {}", dest.display()),
                    e,
                ))
            }
        }
        drop(staging);

        Ok(dest.join(TREE_DIR))
    }

    /// Every complete entry, sorted by digest.
    pub fn list(&self) -> Result<Vec<CacheEntry>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(4)
            .max_depth(4)
            .into_iter()
            .filter_entry(|e| e.file_name() != STAGING_DIR)
            .filter_map(|e| e.ok())
        {
            if entry.file_name() != MARKER_FILE {
                continue;
            }
            let content = match std::fs::read_to_string(entry.path()) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("unreadable cache marker {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let marker: EntryMarker = match serde_json::from_str(&content) {
                Ok(marker) => marker,
                Err(e) => {
                    tracing::warn!("corrupt cache marker {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let Some(dir) = entry.path().parent() else {
                continue;
            };
            let tree = dir.join(TREE_DIR);
            entries.push(CacheEntry {
                size: dir_size(&tree),
                path: tree,
                marker,
            });
        }

        entries.sort_by(|a, b| {
            (&a.marker.digest, a.marker.strip_root).cmp(&(&b.marker.digest, b.marker.strip_root))
        });
        Ok(entries)
    }

    /// Remove every entry and any leftover staging data. Returns the number
    /// of complete entries removed.
    pub fn clean(&self) -> Result<usize> {
        let removed = self.list()?.len();
        for algorithm in [HashAlgorithm::Sha256, HashAlgorithm::Sha512] {
            remove_dir_all_if_exists(&self.root.join(algorithm.name()))?;
        }
        remove_dir_all_if_exists(&self.root.join(STAGING_DIR))?;
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(removed)
    }
}
