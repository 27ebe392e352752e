//! `buildgen -tar|-zip <archive> <dir>`: package an architecture's build tree.
//!
//! The tree is staged under a directory named after the package so that
//! every archive entry starts with the package name, then handed to the
//! system `tar` or `zip`.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::debug;

use super::copy::copy_tree;

/// Archive format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// gzip-compressed tar.
    Tar,
    Zip,
}

impl Format {
    fn label(self) -> &'static str {
        match self {
            Self::Tar => "DIST TAR",
            Self::Zip => "DIST ZIP",
        }
    }

    /// Command archiving `root` (relative to the working directory) into `archive`.
    fn command(self, archive: &Path, root: &str) -> Command {
        match self {
            Self::Tar => {
                let mut cmd = Command::new("tar");
                cmd.arg("-czf").arg(archive).arg(root);
                cmd
            }
            Self::Zip => {
                let mut cmd = Command::new("zip");
                cmd.args(["-q", "-r"]).arg(archive).arg(root);
                cmd
            }
        }
    }
}

/// Root directory name of the archive entries: `BUILD_PACKAGE_NAME`, or the
/// name of `dir` when unset.
fn entry_root(dir: &Path) -> String {
    std::env::var("BUILD_PACKAGE_NAME")
        .map(|v| v.trim_matches('"').to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| dir.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .unwrap_or_else(|| "dist".to_string())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

/// Archive `dir` into `archive`. Does nothing when `dir` does not exist.
pub fn run(format: Format, archive: &Path, dir: &Path) -> Result<()> {
    create(format, archive, dir, &entry_root(dir))
}

/// Archive `dir` into `archive` with every entry under `root/`.
pub fn create(format: Format, archive: &Path, dir: &Path, root: &str) -> Result<()> {
    if !dir.exists() {
        debug!(dir = %dir.display(), "nothing to archive");
        return Ok(());
    }
    super::label(format.label(), format!("{} {}", archive.display(), dir.display()));

    let archive = absolute(archive)?;
    if let Some(parent) = archive.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    if archive.exists() {
        std::fs::remove_file(&archive)
            .with_context(|| format!("removing {}", archive.display()))?;
    }

    let staging = tempfile::tempdir().context("creating staging directory")?;
    copy_tree(dir, &staging.path().join(root))?;

    let mut cmd = format.command(&archive, root);
    cmd.current_dir(staging.path());
    super::run_command(cmd)
}
