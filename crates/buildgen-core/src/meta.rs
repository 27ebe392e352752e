//! Package metadata shared by every hook of a generation run.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::config::PackageConfig;
use crate::error::{GenerateError, Result};

/// Version used when neither the manifest nor git provides one.
pub const FALLBACK_VERSION: &str = "dev";

/// Package name, version and generation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    /// Archive and package base name.
    pub package_name: String,
    /// Optional install prefix, exported to recipes as `BUILD_PACKAGE_PREFIX`.
    pub package_prefix: String,
    pub version: String,
    /// RFC 3339 generation time.
    pub time: String,
    /// Command recipes invoke as `$(BUILD)`.
    pub tool_name: String,
}

impl Meta {
    /// Metadata with the current time and no prefix.
    pub fn new(
        package_name: impl Into<String>,
        version: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            package_prefix: String::new(),
            version: version.into(),
            time: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            tool_name: tool_name.into(),
        }
    }

    /// Replace the generation time.
    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = time.into();
        self
    }

    /// Replace the package prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.package_prefix = prefix.into();
        self
    }

    /// Resolve metadata for a project.
    ///
    /// Unset manifest fields fall back to: the project directory name, then
    /// `git describe --tags --always`, then [`FALLBACK_VERSION`], and the
    /// path of the running executable for the tool name.
    pub fn resolve(project_dir: &Path, package: &PackageConfig, tool: Option<&str>) -> Result<Self> {
        let name = match &package.name {
            Some(name) => name.clone(),
            None => project_dir
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| GenerateError::Meta {
                    detail: format!("no package name and {} has no name", project_dir.display()),
                })?,
        };

        let version = package
            .version
            .clone()
            .or_else(|| git_describe(project_dir))
            .unwrap_or_else(|| FALLBACK_VERSION.to_string());

        let tool_name = match tool {
            Some(tool) => tool.to_string(),
            None => std::env::current_exe()
                .map_err(|e| GenerateError::Meta {
                    detail: format!("cannot locate the running executable: {e}"),
                })?
                .display()
                .to_string(),
        };

        let meta = Self::new(name, version, tool_name)
            .with_prefix(package.prefix.clone().unwrap_or_default());
        debug!(name = %meta.package_name, version = %meta.version, "resolved package metadata");
        Ok(meta)
    }
}

/// The most recent tag (or commit) describing `dir`, if it is a git checkout.
fn git_describe(dir: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always"])
        .current_dir(dir)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!described.is_empty()).then_some(described)
}
