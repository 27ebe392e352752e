//! CLI command implementations.

use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

pub mod apt;
pub mod archive;
pub mod copy;
pub mod generate;
pub mod go;

/// Print a progress line in the same layout as the generated recipes.
pub fn label(label: &str, message: impl std::fmt::Display) {
    println!("{label:<10} {message}");
}

/// Run an external program with inherited stdio, failing on a non-zero exit.
pub fn run_command(mut cmd: Command) -> Result<()> {
    debug!(command = ?cmd, "running");
    let status = cmd
        .status()
        .with_context(|| format!("running {:?}", cmd.get_program()))?;
    if !status.success() {
        bail!("{:?} failed with {status}", cmd.get_program());
    }
    Ok(())
}
