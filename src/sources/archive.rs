//! Archive extraction for acquired artifacts.
//!
//! The compression format is detected from the leading magic bytes, so a
//! mirror that renames `.tar.xz` to `.tgz` still extracts correctly.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use xz2::read::XzDecoder;

use crate::error::{Error, Result};

/// Supported archive containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarXz,
}

impl ArchiveFormat {
    /// Detect the format from the first bytes of the file.
    pub fn detect(header: &[u8]) -> Self {
        if header.starts_with(&[0x1f, 0x8b]) {
            ArchiveFormat::TarGz
        } else if header.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            ArchiveFormat::TarXz
        } else {
            ArchiveFormat::Tar
        }
    }
}

/// Extract the archive at `archive` into `dest`, removing `strip` leading
/// path components from every entry. Returns the number of files written.
pub fn extract_archive(archive: &Path, dest: &Path, strip: usize) -> Result<usize> {
    let label = archive.display().to_string();
    let extract_err = |message: String| Error::Extract {
        archive: label.clone(),
        message,
    };

    let mut file = File::open(archive)
        .map_err(|e| Error::io(format!("failed to open archive: {}", archive.display()), e))?;
    let mut magic = [0u8; 6];
    let read = read_prefix(&mut file, &mut magic)
        .map_err(|e| Error::io(format!("failed to read archive: {}", archive.display()), e))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| Error::io(format!("failed to read archive: {}", archive.display()), e))?;

    let format = ArchiveFormat::detect(&magic[..read]);
    tracing::debug!("extracting {} as {:?} (strip {})", label, format, strip);

    let reader = BufReader::new(file);
    let decoder: Box<dyn Read> = match format {
        ArchiveFormat::TarGz => Box::new(GzDecoder::new(reader)),
        ArchiveFormat::TarXz => Box::new(XzDecoder::new(reader)),
        ArchiveFormat::Tar => Box::new(reader),
    };

    std::fs::create_dir_all(dest).map_err(|e| {
        Error::io(
            format!("failed to create destination directory: {}", dest.display()),
            e,
        )
    })?;

    let mut tar = Archive::new(decoder);
    let entries = tar
        .entries()
        .map_err(|e| extract_err(format!("failed to read entries: {}", e)))?;

    let mut files = 0;
    for entry in entries {
        let mut entry = entry.map_err(|e| extract_err(format!("failed to read entry: {}", e)))?;
        let entry_path = entry
            .path()
            .map_err(|e| extract_err(format!("invalid entry path: {}", e)))?
            .into_owned();

        let Some(relative) = strip_components(&entry_path, strip).map_err(&extract_err)? else {
            continue;
        };
        let output_path = dest.join(&relative);

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::io(format!("failed to create directory: {}", parent.display()), e)
            })?;
        }

        match entry.header().entry_type() {
            EntryType::Directory => {
                std::fs::create_dir_all(&output_path).map_err(|e| {
                    Error::io(
                        format!("failed to create directory: {}", output_path.display()),
                        e,
                    )
                })?;
            }
            EntryType::Regular | EntryType::Continuous => {
                entry.unpack(&output_path).map_err(|e| {
                    extract_err(format!("failed to extract {}: {}", relative.display(), e))
                })?;
                files += 1;
            }
            EntryType::Symlink => {
                #[cfg(unix)]
                {
                    if let Ok(Some(target)) = entry.link_name() {
                        std::os::unix::fs::symlink(&*target, &output_path).map_err(
                            |e| {
                                Error::io(
                                    format!("failed to create symlink: {}", output_path.display()),
                                    e,
                                )
                            },
                        )?;
                    }
                }
                #[cfg(windows)]
                {
                    tracing::debug!("skipping symlink on Windows: {}", entry_path.display());
                }
            }
            EntryType::Link => {
                let target = entry
                    .link_name()
                    .map_err(|e| extract_err(format!("invalid link target: {}", e)))?
                    .map(|t| t.into_owned());
                let Some(target) = target else {
                    continue;
                };
                let Some(target) = strip_components(&target, strip).map_err(&extract_err)? else {
                    continue;
                };
                let source = dest.join(target);
                if std::fs::hard_link(&source, &output_path).is_err() {
                    std::fs::copy(&source, &output_path).map_err(|e| {
                        Error::io(
                            format!("failed to extract hard link: {}", output_path.display()),
                            e,
                        )
                    })?;
                }
                files += 1;
            }
            other => {
                tracing::debug!(
                    "skipping unsupported entry type {:?}: {}",
                    other,
                    entry_path.display()
                );
            }
        }
    }

    Ok(files)
}

/// Remove `strip` leading components, rejecting paths that could escape.
///
/// Returns `Ok(None)` for entries with nothing left after stripping.
fn strip_components(path: &Path, strip: usize) -> std::result::Result<Option<PathBuf>, String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(format!(
                    "entry `{}` escapes the extraction directory",
                    path.display()
                ));
            }
        }
    }

    if parts.len() <= strip {
        return Ok(None);
    }
    Ok(Some(parts[strip..].iter().collect()))
}

fn read_prefix(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
