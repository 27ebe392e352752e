//! `buildgen.toml` manifest parsing and project configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use buildgen_core::{DebianConfig, PackageConfig};
use serde::{Deserialize, Serialize};

/// Manifest file name, searched for upward from the working directory.
pub const MANIFEST_FILE: &str = "buildgen.toml";

/// The top-level manifest structure. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Package metadata.
    #[serde(default)]
    pub package: PackageConfig,
    /// Generation settings.
    #[serde(default)]
    pub build: BuildSection,
    /// Debian packaging. Enables `.deb` targets when present.
    #[serde(default)]
    pub debian: Option<DebianConfig>,
}

/// `[build]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildSection {
    /// Command generated recipes use to re-invoke the tool.
    #[serde(default)]
    pub tool: Option<String>,
    /// Directory holding `<tool>/bin/main.go`.
    #[serde(default)]
    pub tools_dir: Option<PathBuf>,
    /// Block policy file, relative to the manifest.
    #[serde(default)]
    pub block: Option<PathBuf>,
}

impl BuildManifest {
    /// Search upward from `start_dir` for a `buildgen.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: BuildManifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Parse a manifest from a TOML string.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing buildgen.toml")
    }

    /// The Debian section with its version defaulted, if packaging is enabled.
    pub fn debian_for(&self, version: &str) -> Option<DebianConfig> {
        self.debian
            .as_ref()
            .map(|d| d.with_version_fallback(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_manifest() {
        let manifest = BuildManifest::from_str(
            r#"
[package]
name = "widget"
version = "1.4.0"
prefix = "/opt/widget"

[build]
tool = "go run ./tools/build"
tools-dir = "cmd"
block = "blocklist.toml"

[debian]
name = "widget"
release = "2"
maintainer = "Ops <ops@example.com>"
depends = ["libc6"]
lintian = true
"#,
        )
        .unwrap();
        assert_eq!(manifest.package.name.as_deref(), Some("widget"));
        assert_eq!(manifest.package.prefix.as_deref(), Some("/opt/widget"));
        assert_eq!(manifest.build.tool.as_deref(), Some("go run ./tools/build"));
        assert_eq!(manifest.build.tools_dir, Some(PathBuf::from("cmd")));
        assert_eq!(manifest.build.block, Some(PathBuf::from("blocklist.toml")));

        let debian = manifest.debian_for("1.4.0").unwrap();
        assert_eq!(debian.version, "1.4.0");
        assert!(debian.lintian);
    }

    #[test]
    fn parse_empty_manifest() {
        let manifest = BuildManifest::from_str("").unwrap();
        assert!(manifest.package.name.is_none());
        assert!(manifest.build.tool.is_none());
        assert!(manifest.debian_for("1").is_none());
    }

    #[test]
    fn reject_invalid_toml() {
        assert!(BuildManifest::from_str("[package\nname = 1").is_err());
    }

    #[test]
    fn find_and_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            "[package]\nname = \"parent\"\n",
        )
        .unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let (manifest, found) = BuildManifest::find_and_load(&nested).unwrap().unwrap();
        assert_eq!(manifest.package.name.as_deref(), Some("parent"));
        assert_eq!(found, dir.path());
    }

    #[test]
    fn find_and_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "package = 3").unwrap();
        let err = BuildManifest::find_and_load(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
    }
}
