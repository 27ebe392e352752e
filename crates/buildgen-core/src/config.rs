//! Generation options and the package section of the project manifest.

use std::path::{Path, PathBuf};

use buildgen_arch::Architecture;
pub use buildgen_pipeline::DEFAULT_MAKEFILE;
use serde::{Deserialize, Serialize};

/// Default per-architecture build directory.
pub const DEFAULT_DEST: &str = "builds";
/// Default archive directory.
pub const DEFAULT_DIST: &str = "dist";
/// Default directory holding `<tool>/bin/main.go` entry points.
pub const DEFAULT_TOOLS_DIR: &str = "tools";
/// Default Jenkins agent label.
pub const DEFAULT_BUILD_NODE: &str = "go";

/// `[package]` section of `buildgen.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Package name. Defaults to the project directory name.
    pub name: Option<String>,
    /// Package version. Defaults to `git describe`.
    pub version: Option<String>,
    /// Install prefix exported to recipes.
    pub prefix: Option<String>,
}

/// Options for one generation run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory tools are discovered in and outputs are written to.
    pub project_dir: PathBuf,
    /// Makefile to write, relative to the project directory.
    pub makefile: PathBuf,
    /// Space-separated OS names, platform labels or rule tokens that `all`
    /// is restricted to. Empty builds everything.
    pub platforms: String,
    /// Per-architecture build directory, as written into recipes.
    pub dest: String,
    /// Archive directory, as written into recipes.
    pub dist: String,
    /// Tool entry point directory, relative to the project directory.
    pub tools_dir: PathBuf,
    /// Jenkins agent label.
    pub build_node: String,
    /// One parallel stage per OS instead of one stage per architecture.
    pub parallel: bool,
    /// Artifacts to archive at the end of the pipeline.
    pub archive_artifacts: Option<String>,
    /// Allow generating with no tools.
    pub no_tools: bool,
    /// Make `all` build the host platform only.
    pub build_local: bool,
    /// The platform the generator runs on.
    pub host: Architecture,
}

impl BuildConfig {
    /// Defaults for a project directory.
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            makefile: PathBuf::from(DEFAULT_MAKEFILE),
            platforms: String::new(),
            dest: DEFAULT_DEST.to_string(),
            dist: DEFAULT_DIST.to_string(),
            tools_dir: PathBuf::from(DEFAULT_TOOLS_DIR),
            build_node: DEFAULT_BUILD_NODE.to_string(),
            parallel: false,
            archive_artifacts: None,
            no_tools: false,
            build_local: false,
            host: Architecture::host(),
        }
    }

    /// Requested platform tokens.
    pub fn platform_tokens(&self) -> Vec<&str> {
        self.platforms.split_whitespace().collect()
    }

    /// Full path of an output file.
    pub fn output_path(&self, file: &Path) -> PathBuf {
        self.project_dir.join(file)
    }

    /// The Makefile path as invoked from the pipeline.
    pub fn makefile_name(&self) -> String {
        self.makefile.display().to_string()
    }
}
