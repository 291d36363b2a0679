use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Same bound the Linux kernel puts on nested symlink resolution.
const MAX_SYMLINK_HOPS: usize = 40;

/// Turn an archive entry path into a path relative to the destination.
///
/// Absolute paths and `..` that climb above the destination are rejected;
/// `.` components are dropped. The first `strip` normal components are then
/// removed.
pub fn sanitize_entry_path(entry: &Path, strip: usize) -> Result<PathBuf> {
    let normalized = normalize_relative(entry).ok_or_else(|| Error::PathEscape {
        entry: entry.to_path_buf(),
    })?;

    if strip == 0 {
        return Ok(normalized);
    }

    let components: Vec<_> = normalized.components().collect();
    if components.len() <= strip {
        return Err(Error::NoComponentsRemaining {
            original: entry.to_path_buf(),
            count:    strip,
        });
    }
    Ok(components[strip..].iter().collect())
}

/// Check that a symlink placed at `link` (relative to `destination`) stays
/// inside the destination when followed.
///
/// The target is resolved against what is already on disk, so links created
/// by earlier entries are followed the way the kernel would follow them.
/// Components that do not exist yet resolve lexically. Absolute targets are
/// rejected outright. The target itself is returned unchanged so the link
/// keeps its relative form on disk.
pub fn sanitize_symlink_target(destination: &Path, link: &Path, target: &Path) -> Result<PathBuf> {
    let escape = || Error::SymlinkEscape {
        link:   link.to_path_buf(),
        target: target.to_path_buf(),
    };

    let parent = link.parent().unwrap_or(Path::new(""));
    let mut pending: VecDeque<Step> = steps(parent)
        .into_iter()
        .chain(steps(target))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(escape)?
        .into();

    let mut resolved = PathBuf::new();
    let mut hops = 0;
    while let Some(step) = pending.pop_front() {
        let part = match step {
            Step::Up if resolved.pop() => continue,
            Step::Up => return Err(escape()),
            Step::Down(part) => part,
        };
        resolved.push(&part);

        let on_disk = destination.join(&resolved);
        let is_link = fs::symlink_metadata(&on_disk).is_ok_and(|meta| meta.file_type().is_symlink());
        if !is_link {
            continue;
        }

        hops += 1;
        if hops > MAX_SYMLINK_HOPS {
            return Err(escape());
        }
        let next = fs::read_link(&on_disk).map_err(|source| Error::ExtractionFailed {
            path: on_disk.clone(),
            source,
        })?;
        let next = steps(&next).collect::<Option<Vec<_>>>().ok_or_else(escape)?;
        resolved.pop();
        for step in next.into_iter().rev() {
            pending.push_front(step);
        }
    }

    Ok(target.to_path_buf())
}

/// Fail if any existing component of `path` (relative to `destination`) is
/// a symlink. Checking stops at the first component that does not exist.
pub fn reject_symlinks_along(destination: &Path, path: &Path) -> Result<()> {
    let mut current = destination.to_path_buf();
    for component in path.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => return Err(Error::SymlinkInPath { link: current }),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(Error::ExtractionFailed { path: current, source }),
        }
    }
    Ok(())
}

enum Step {
    Up,
    Down(OsString),
}

/// `None` items mark an absolute path.
fn steps(path: &Path) -> impl Iterator<Item = Option<Step>> + '_ {
    path.components().filter_map(|component| match component {
        Component::Normal(part) => Some(Some(Step::Down(part.to_os_string()))),
        Component::ParentDir => Some(Some(Step::Up)),
        Component::CurDir => None,
        Component::RootDir | Component::Prefix(_) => Some(None),
    })
}

/// Lexically resolve `.` and `..`. `None` if the path is absolute or climbs
/// above its starting point.
fn normalize_relative(path: &Path) -> Option<PathBuf> {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => result.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(result)
}
