//! `buildgen -copy <src> -d <dest>`: copy a file or a directory tree.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

/// Copy `src` to `dest`. A directory's contents are copied into `dest`; a
/// file is copied into `dest` when it is a directory, or to `dest` itself.
pub fn run(src: &Path, dest: &Path) -> Result<()> {
    super::label("COPY", format!("{} {}", src.display(), dest.display()));
    let meta = fs::metadata(src).with_context(|| format!("reading {}", src.display()))?;
    if meta.is_dir() {
        copy_tree(src, dest)
    } else if dest.is_dir() {
        let name = src
            .file_name()
            .with_context(|| format!("{} has no file name", src.display()))?;
        copy_file(src, &dest.join(name))
    } else {
        copy_file(src, dest)
    }
}

/// Recursively copy the contents of `src` into `dest`, creating it.
/// Symlinks are recreated rather than followed.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).with_context(|| format!("creating {}", dest.display()))?;
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("reading {}", src.display()))?;
        let path = entry.path();
        let rel = path
            .strip_prefix(src)
            .with_context(|| format!("{} is outside {}", path.display(), src.display()))?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).with_context(|| format!("creating {}", target.display()))?;
        } else if entry.file_type().is_symlink() {
            copy_symlink(path, &target)?;
        } else {
            copy_file(path, &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    if fs::symlink_metadata(dest).is_ok() {
        fs::remove_file(dest).with_context(|| format!("removing {}", dest.display()))?;
    }
    let link = fs::read_link(src).with_context(|| format!("reading link {}", src.display()))?;
    std::os::unix::fs::symlink(&link, dest)
        .with_context(|| format!("linking {} to {}", dest.display(), link.display()))?;
    debug!(src = %src.display(), dest = %dest.display(), "linked");
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dest: &Path) -> Result<()> {
    if src.is_dir() {
        copy_tree(&fs::canonicalize(src)?, dest)
    } else {
        copy_file(src, dest)
    }
}

/// Copy one file, keeping its permissions.
pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::copy(src, dest)
        .with_context(|| format!("copying {} to {}", src.display(), dest.display()))?;
    debug!(src = %src.display(), dest = %dest.display(), "copied");
    Ok(())
}
