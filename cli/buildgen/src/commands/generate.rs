//! `buildgen -build`: generate the Makefile, platform table and Jenkinsfile.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use buildgen_arch::{BlockPolicy, GoToolchain, PlatformSource};
use buildgen_core::{BuildConfig, Generator, Meta, Outputs, PackageConfig};
use tracing::info;

use crate::manifest::BuildManifest;

/// Generation flags.
#[derive(Debug, Clone)]
pub struct Options {
    pub makefile: PathBuf,
    pub platforms: String,
    pub dest: String,
    pub dist: String,
    /// Block policy file given on the command line. Overrides the manifest.
    pub block: Option<PathBuf>,
    pub build_node: String,
    pub parallel: bool,
    pub archive_artifacts: Option<String>,
    pub no_tools: bool,
    pub build_local: bool,
}

impl Options {
    /// Defaults for writing `makefile`.
    pub fn new(makefile: impl Into<PathBuf>) -> Self {
        Self {
            makefile: makefile.into(),
            platforms: String::new(),
            dest: buildgen_core::config::DEFAULT_DEST.to_string(),
            dist: buildgen_core::config::DEFAULT_DIST.to_string(),
            block: None,
            build_node: buildgen_core::config::DEFAULT_BUILD_NODE.to_string(),
            parallel: false,
            archive_artifacts: None,
            no_tools: false,
            build_local: false,
        }
    }
}

/// Generate the build files of the project in `project_dir` using the
/// platforms reported by the local Go toolchain.
pub fn run(project_dir: &Path, manifest: Option<&BuildManifest>, options: &Options) -> Result<()> {
    generate(project_dir, manifest, options, &GoToolchain::new())?;
    Ok(())
}

/// [`run`] with an explicit platform source.
pub fn generate(
    project_dir: &Path,
    manifest: Option<&BuildManifest>,
    options: &Options,
    source: &dyn PlatformSource,
) -> Result<Outputs> {
    let default_manifest = BuildManifest::default();
    let manifest = manifest.unwrap_or(&default_manifest);

    let policy = load_policy(project_dir, manifest, options)?;
    let config = build_config(project_dir, manifest, options);
    let meta = resolve_meta(project_dir, &manifest.package, manifest.build.tool.as_deref())?;

    let mut generator = Generator::new(config, policy);
    if let Some(debian) = manifest.debian_for(&meta.version) {
        info!(package = %debian.name, "debian packaging enabled");
        generator.register_extension(debian.extension(options.dest.clone()));
    }

    let outputs = generator
        .run(source, &meta)
        .context("generating build files")?;

    super::label("BUILD", options.makefile.display());
    super::label(
        "PLATFORMS",
        format!("{} architectures, {} tools", outputs.arches.len(), outputs.tools.len()),
    );
    Ok(outputs)
}

fn build_config(project_dir: &Path, manifest: &BuildManifest, options: &Options) -> BuildConfig {
    let mut config = BuildConfig::new(project_dir);
    config.makefile = options.makefile.clone();
    config.platforms = options.platforms.clone();
    config.dest = options.dest.clone();
    config.dist = options.dist.clone();
    config.build_node = options.build_node.clone();
    config.parallel = options.parallel;
    config.archive_artifacts = options.archive_artifacts.clone();
    config.no_tools = options.no_tools;
    config.build_local = options.build_local;
    if let Some(tools_dir) = &manifest.build.tools_dir {
        config.tools_dir = tools_dir.clone();
    }
    config
}

fn load_policy(project_dir: &Path, manifest: &BuildManifest, options: &Options) -> Result<BlockPolicy> {
    let path = match (&options.block, &manifest.build.block) {
        (Some(path), _) => path.clone(),
        (None, Some(path)) => project_dir.join(path),
        (None, None) => return Ok(BlockPolicy::builtin()),
    };
    let overrides = BlockPolicy::load(&path)
        .with_context(|| format!("loading block policy {}", path.display()))?;
    Ok(BlockPolicy::builtin().merge(overrides))
}

fn resolve_meta(project_dir: &Path, package: &PackageConfig, tool: Option<&str>) -> Result<Meta> {
    Meta::resolve(project_dir, package, tool).context("resolving package metadata")
}
