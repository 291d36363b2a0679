use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tar::EntryType;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::format::TarCompress;
use crate::options::ExtractOptions;
use crate::sanitize::{reject_symlinks_along, sanitize_entry_path, sanitize_symlink_target};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

#[derive(Clone, Debug)]
pub struct ExtractedEntry {
    /// Path relative to the destination, after sanitizing and stripping.
    pub path:           PathBuf,
    pub kind:           EntryKind,
    pub size:           u64,
    pub mode:           Option<u32>,
    pub symlink_target: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct ExtractReport {
    pub entry_count: usize,
    /// Bytes of regular file content written.
    pub total_bytes: u64,
    /// Empty when [`ExtractOptions::record_entries`] is off.
    pub entries:     Vec<ExtractedEntry>,
}

impl ExtractReport {
    fn record(&mut self, entry: ExtractedEntry, keep: bool) {
        self.entry_count += 1;
        if entry.kind == EntryKind::File {
            self.total_bytes += entry.size;
        }
        if keep {
            self.entries.push(entry);
        }
    }
}

/// Decompress `reader` with `codec` and unpack the tar stream into
/// `destination`, one entry at a time.
///
/// Returns as soon as the tar end-of-archive marker is seen; whatever follows
/// it in `reader` is left unread. Entries already written stay on disk if a
/// later one fails.
///
/// Nothing is ever written through a symlink found under `destination`,
/// whether the archive created it or it was there before.
pub fn extract_stream<R: Read>(
    reader: R,
    codec: TarCompress,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    fs::create_dir_all(destination).map_err(|source| Error::ExtractionFailed {
        path: destination.to_path_buf(),
        source,
    })?;

    let mut archive = tar::Archive::new(codec.decoder(reader)?);
    let mut report = ExtractReport::default();

    for entry in archive.entries().map_err(Error::Corrupted)? {
        let mut entry = entry.map_err(Error::Corrupted)?;
        let raw_path = entry.path().map_err(|_| Error::InvalidPath)?.into_owned();
        let header = entry.header();
        let entry_type = header.entry_type();
        let mode = header.mode().ok();
        let size = header.size().unwrap_or(0);

        let relative = match sanitize_entry_path(&raw_path, options.strip_components) {
            Ok(path) => path,
            // The stripped leading directories themselves.
            Err(Error::NoComponentsRemaining { .. }) if entry_type.is_dir() => {
                debug!(path = %raw_path.display(), "skipping stripped directory");
                continue;
            }
            Err(e) => return Err(e),
        };
        let target = destination.join(&relative);
        let parent = relative.parent().unwrap_or(Path::new(""));

        let extracted = match entry_type {
            EntryType::Directory => {
                reject_symlinks_along(destination, &relative)?;
                debug!(path = %relative.display(), "creating directory");
                create_dir(&target)?;
                if options.preserve_permissions {
                    set_mode(&target, mode.map(|m| m | 0o700))?;
                }
                ExtractedEntry {
                    path: relative,
                    kind: EntryKind::Directory,
                    size: 0,
                    mode,
                    symlink_target: None,
                }
            }
            EntryType::Regular | EntryType::Continuous => {
                if relative.as_os_str().is_empty() {
                    return Err(Error::InvalidPath);
                }
                reject_symlinks_along(destination, parent)?;
                info!(path = %relative.display(), size, "extracting");
                let written = write_file(&mut entry, &target)?;
                if options.preserve_permissions {
                    set_mode(&target, mode)?;
                }
                ExtractedEntry {
                    path: relative,
                    kind: EntryKind::File,
                    size: written,
                    mode,
                    symlink_target: None,
                }
            }
            EntryType::Symlink => {
                let link_target = entry
                    .link_name()
                    .map_err(|_| Error::InvalidPath)?
                    .ok_or(Error::InvalidPath)?
                    .into_owned();
                reject_symlinks_along(destination, parent)?;
                let link_target = sanitize_symlink_target(destination, &relative, &link_target)?;
                debug!(path = %relative.display(), target = %link_target.display(), "creating symlink");
                create_symlink(&link_target, &target)?;
                ExtractedEntry {
                    path: relative,
                    kind: EntryKind::Symlink,
                    size: 0,
                    mode,
                    symlink_target: Some(link_target),
                }
            }
            other => {
                debug!(path = %raw_path.display(), entry_type = ?other, "skipping unsupported entry");
                continue;
            }
        };

        report.record(extracted, options.record_entries);
    }

    info!(
        entries = report.entry_count,
        bytes = report.total_bytes,
        destination = %destination.display(),
        "archive extracted"
    );
    Ok(report)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| Error::ExtractionFailed {
        path: path.to_path_buf(),
        source,
    })
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => create_dir(parent),
        None => Ok(()),
    }
}

/// An existing symlink at `path` is replaced, never written through.
fn write_file(entry: &mut impl Read, path: &Path) -> Result<u64> {
    create_parent(path)?;
    let failed = |source| Error::ExtractionFailed {
        path: path.to_path_buf(),
        source,
    };
    if fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink()) {
        fs::remove_file(path).map_err(failed)?;
    }
    let mut file = File::create(path).map_err(failed)?;
    io::copy(entry, &mut file).map_err(failed)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let Some(mode) = mode else { return Ok(()) };
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)).map_err(|source| {
        Error::ExtractionFailed {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: Option<u32>) -> Result<()> { Ok(()) }

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    create_parent(link)?;
    let failed = |source| Error::ExtractionFailed {
        path: link.to_path_buf(),
        source,
    };
    match fs::remove_file(link) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(failed(e)),
        _ => {}
    }
    std::os::unix::fs::symlink(target, link).map_err(failed)
}

#[cfg(not(unix))]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    debug!(link = %link.display(), target = %target.display(), "symlinks are not created on this platform");
    Ok(())
}
