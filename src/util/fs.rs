//! Filesystem utilities.

use std::fs;
use std::path::{Component, Path, PathBuf};

use glob::glob;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| {
            Error::io(format!("failed to remove directory: {}", path.display()), e)
        })?;
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            Error::io(format!("failed to create directory: {}", path.display()), e)
        })?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::io(format!("failed to read file: {}", path.display()), e))
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .map_err(|e| Error::io(format!("failed to write file: {}", path.display()), e))
}

/// Find directories matching glob patterns relative to a base directory.
pub fn glob_dirs(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut results = Vec::new();

    for pattern in patterns {
        let full_pattern = base.join(pattern);
        let pattern_str = full_pattern.to_string_lossy();

        let entries = glob(&pattern_str).map_err(|e| {
            Error::invalid_recipe(base, format!("invalid glob pattern `{}`: {}", pattern, e))
        })?;
        for entry in entries {
            match entry {
                Ok(path) => {
                    if path.is_dir() {
                        results.push(path);
                    }
                }
                Err(e) => {
                    tracing::warn!("glob error: {}", e);
                }
            }
        }
    }

    results.sort();
    results.dedup();
    Ok(results)
}

/// List every file below `root` as a sorted, `/`-separated relative path.
///
/// Symlinks to files are listed; symlinked directories are not descended.
pub fn walk_files(root: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let context = format!("failed to walk {}", root.display());
            match e.into_io_error() {
                Some(io) => Error::io(context, io),
                None => Error::io(context, std::io::Error::other("filesystem loop")),
            }
        })?;
        let file_type = entry.file_type();
        let is_file = file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }
        let relative = relative_path(root, entry.path());
        files.push(to_slash(&relative));
    }
    files.sort();
    Ok(files)
}

/// Total size in bytes of the files below `root`.
pub fn dir_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Render a relative path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// True when a relative path stays inside its base: no `..`, no root, no prefix.
pub fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Join `/`-separated segments, skipping empty ones.
pub fn join_slash(base: &str, rest: &str) -> String {
    match (base.trim_matches('/'), rest.trim_matches('/')) {
        ("", r) => r.to_string(),
        (b, "") => b.to_string(),
        (b, r) => format!("{}/{}", b, r),
    }
}
