//! Test fixtures for common test scenarios.
//!
//! Tarball builders for acquisition tests and recipe fixtures that write a
//! recipe directory (manifest plus vendored files) to disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use xz2::write::XzEncoder;

/// An uncompressed tarball holding `entries` as regular files.
pub fn tar_plain(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder
            .append_data(&mut header, path, *content)
            .expect("failed to append tar entry");
    }
    builder.into_inner().expect("failed to finish tarball")
}

/// A gzip-compressed tarball.
pub fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&tar_plain(entries))
        .expect("failed to compress tarball");
    encoder.finish().expect("failed to finish gzip stream")
}

/// An xz-compressed tarball.
pub fn tar_xz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut encoder = XzEncoder::new(Vec::new(), 6);
    encoder
        .write_all(&tar_plain(entries))
        .expect("failed to compress tarball");
    encoder.finish().expect("failed to finish xz stream")
}

/// A tarball with a single entry whose name is written verbatim, bypassing
/// the path checks `tar::Builder` applies. Used to craft hostile archives.
pub fn tar_with_raw_path(path: &str, content: &[u8]) -> Vec<u8> {
    let mut header = tar::Header::new_old();
    let name = path.as_bytes();
    header.as_old_mut().name[..name.len()].copy_from_slice(name);
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();

    let mut builder = tar::Builder::new(Vec::new());
    builder
        .append(&header, content)
        .expect("failed to append tar entry");
    builder.into_inner().expect("failed to finish tarball")
}

/// Fixture for a recipe directory.
#[derive(Debug, Clone)]
pub struct RecipeFixture {
    /// Directory name, relative to the workspace root.
    pub dir: String,
    /// recipe.toml content.
    pub manifest: String,
    /// Vendored files (path relative to the recipe directory -> content).
    pub files: Vec<(PathBuf, String)>,
}

impl RecipeFixture {
    pub fn new(dir: impl Into<String>, manifest: impl Into<String>) -> Self {
        RecipeFixture {
            dir: dir.into(),
            manifest: manifest.into(),
            files: Vec::new(),
        }
    }

    /// A header-only recipe copying `include/*.h` into `include/`.
    pub fn headers(name: &str, requires: &[&str]) -> Self {
        RecipeFixture::new(name, manifests::header_only(name, requires))
            .with_file(format!("include/{}.h", name), headers::guard(name))
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.push((path.into(), content.into()));
        self
    }

    /// Write this fixture below `base_path`, returning the recipe directory.
    pub fn write_to(&self, base_path: &Path) -> std::io::Result<PathBuf> {
        let recipe_dir = base_path.join(&self.dir);
        std::fs::create_dir_all(&recipe_dir)?;
        std::fs::write(recipe_dir.join("recipe.toml"), &self.manifest)?;

        for (rel_path, content) in &self.files {
            let full_path = recipe_dir.join(rel_path);
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&full_path, content)?;
        }

        Ok(recipe_dir)
    }
}

/// Common manifest templates.
pub mod manifests {
    fn quoted(items: &[&str]) -> String {
        items
            .iter()
            .map(|m| format!("\"{}\"", m))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// A workspace manifest with members.
    pub fn workspace(members: &[&str]) -> String {
        let members_str = quoted(members);
        format!(
            r#"[workspace]
members = [{members_str}]
"#
        )
    }

    /// A workspace manifest naming its consumer.
    pub fn workspace_with_consumer(members: &[&str], consumer: &str) -> String {
        let members_str = quoted(members);
        format!(
            r#"[workspace]
members = [{members_str}]
consumer = "{consumer}"
"#
        )
    }

    /// A header-only recipe exporting `include`.
    pub fn header_only(name: &str, requires: &[&str]) -> String {
        let requires_str = quoted(requires);
        format!(
            r#"[package]
name = "{name}"
version = "1.0.0"
type = "header-only"
requires = [{requires_str}]

[[copy]]
pattern = "*.h"
from = "include"
to = "include"

[exports]
include_dirs = ["include"]
"#
        )
    }

    /// A prebuilt toolchain recipe exporting a C compiler and `bin` on PATH.
    pub fn toolchain(name: &str, url: &str, checksum: &str) -> String {
        format!(
            r#"[package]
name = "{name}"
version = "13.2.1"
type = "prebuilt-binary"

[remote]
url = "{url}"
checksum = "{checksum}"
strip_root = 1

[[copy]]
pattern = "*"
from = "bin"
to = "bin"

[exports.executables]
c = "arm-none-eabi-gcc"

[exports.flags]
c = ["-mcpu=cortex-m4", "-mthumb"]

[[exports.env]]
var = "PATH"
op = "append"
value = "bin"
path = true
"#
        )
    }
}

/// Common header templates.
pub mod headers {
    /// A header with an include guard.
    pub fn guard(name: &str) -> String {
        let guard = name.to_uppercase().replace(['-', '.'], "_");
        format!(
            r#"#ifndef {guard}_H
#define {guard}_H

#endif // {guard}_H
"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_recipe_fixture_write_to() {
        let tmp = TempDir::new().unwrap();
        let dir = RecipeFixture::headers("cmsis", &[]).write_to(tmp.path()).unwrap();

        assert!(dir.join("recipe.toml").is_file());
        let header = std::fs::read_to_string(dir.join("include/cmsis.h")).unwrap();
        assert!(header.contains("#ifndef CMSIS_H"));
    }

    #[test]
    fn test_manifest_templates() {
        let ws = manifests::workspace(&["cmsis", "hal"]);
        assert!(ws.contains("members = [\"cmsis\", \"hal\"]"));

        let hal = manifests::header_only("hal", &["cmsis"]);
        assert!(hal.contains("requires = [\"cmsis\"]"));
    }

    #[test]
    fn test_tarballs_differ_by_compression() {
        let entries: &[(&str, &[u8])] = &[("gcc/bin/gcc", b"x")];
        assert!(tar_gz(entries).starts_with(&[0x1f, 0x8b]));
        assert!(tar_xz(entries).starts_with(&[0xfd, b'7', b'z']));
        assert_eq!(tar_plain(entries).len() % 512, 0);
    }
}
