//! buildgen CLI: generates the build descriptors of a multi-platform Go
//! project and runs the build steps those descriptors call back into.

mod commands;
mod manifest;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Once;

use clap::Parser;

use manifest::BuildManifest;

/// Long flags accepted with a single dash, as written by generated recipes.
const LONG_FLAGS: &[&str] = &[
    "build",
    "build-platform",
    "dist",
    "block",
    "build-node",
    "build-parallel",
    "build-archiveArtifacts",
    "build-no-tools",
    "build-local",
    "go",
    "go-test-fail",
    "tar",
    "zip",
    "copy",
    "apt",
    "apt-src",
    "verbose",
];

#[derive(Parser, Debug)]
#[command(name = "buildgen", version, about = "Multi-platform build generator")]
struct Cli {
    /// Generate the build files, writing the Makefile to this path
    #[arg(long)]
    build: Option<PathBuf>,
    /// Platforms `all` builds: OS names, os:arch:arm labels or rule tokens
    #[arg(long = "build-platform", default_value = "")]
    build_platform: String,
    /// Archive destination
    #[arg(long, default_value = buildgen_core::config::DEFAULT_DIST)]
    dist: String,
    /// Build destination
    #[arg(short = 'd', default_value = buildgen_core::config::DEFAULT_DEST)]
    dest: String,
    /// Block policy file (TOML, or JSON/YAML by .json, .yaml or .yml extension)
    #[arg(long)]
    block: Option<PathBuf>,
    /// Jenkins agent to run on
    #[arg(long = "build-node", default_value = buildgen_core::config::DEFAULT_BUILD_NODE)]
    build_node: String,
    /// Group pipeline stages by OS and run each OS's stages in parallel
    #[arg(long = "build-parallel")]
    build_parallel: bool,
    /// Archive matching files when the pipeline completes
    #[arg(long = "build-archiveArtifacts")]
    archive_artifacts: Option<String>,
    /// Allow generating with no tools
    #[arg(long = "build-no-tools")]
    no_tools: bool,
    /// Make `all` build the local platform only
    #[arg(long = "build-local")]
    build_local: bool,
    /// Run a go command: build, test or clean
    #[arg(long)]
    go: Option<String>,
    /// Fail the build when tests fail
    #[arg(long = "go-test-fail")]
    go_test_fail: bool,
    /// Create a tar+gzip archive: <archive> <dir>
    #[arg(long)]
    tar: bool,
    /// Create a zip archive: <archive> <dir>
    #[arg(long)]
    zip: bool,
    /// Copy a file or directory tree into the destination
    #[arg(long)]
    copy: Option<PathBuf>,
    /// Build a Debian package at this path
    #[arg(long)]
    apt: Option<PathBuf>,
    /// Directory packaged by -apt
    #[arg(long = "apt-src")]
    apt_src: Option<PathBuf>,
    /// Debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
    /// Command arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

/// Turn `-flag` and `-flag=value` for known long flags into `--flag`.
/// Everything after `--` is left untouched.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut out = Vec::new();
    let mut passthrough = false;
    for (i, arg) in args.into_iter().enumerate() {
        if i == 0 || passthrough {
            out.push(arg);
            continue;
        }
        let Some(text) = arg.to_str() else {
            out.push(arg);
            continue;
        };
        if text == "--" {
            passthrough = true;
            out.push(arg);
            continue;
        }
        let normalized = text
            .strip_prefix('-')
            .filter(|rest| !rest.starts_with('-'))
            .filter(|rest| {
                let name = rest.split('=').next().unwrap_or_default();
                LONG_FLAGS.contains(&name)
            })
            .map(|rest| OsString::from(format!("--{rest}")));
        out.push(normalized.unwrap_or(arg));
    }
    out
}

static TRACING_INIT: Once = Once::new();

/// Install the log subscriber once. Stays silent unless `RUST_LOG` is set
/// or `verbose` is requested.
fn init_tracing(verbose: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = if verbose {
            EnvFilter::new("buildgen=debug,buildgen_core=debug,buildgen_arch=debug,buildgen_pipeline=debug")
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}

fn main() {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    init_tracing(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let dest = Path::new(&cli.dest);

    if let Some(action) = &cli.go {
        return match action.as_str() {
            "build" => commands::go::build(dest, &cli.args),
            "test" => commands::go::test(dest, cli.go_test_fail),
            "clean" => commands::go::clean(&cli.args),
            other => anyhow::bail!("unknown go command {other:?}"),
        };
    }

    if cli.tar || cli.zip {
        let [archive, dir] = cli.args.as_slice() else {
            anyhow::bail!("-{} archive src", if cli.tar { "tar" } else { "zip" });
        };
        let format = if cli.tar {
            commands::archive::Format::Tar
        } else {
            commands::archive::Format::Zip
        };
        return commands::archive::run(format, Path::new(archive), Path::new(dir));
    }

    if let Some(src) = &cli.copy {
        return commands::copy::run(src, dest);
    }

    if let Some(deb) = &cli.apt {
        let Some(src) = &cli.apt_src else {
            anyhow::bail!("-apt-src required for -apt");
        };
        let (manifest, _) = load_manifest_optional(&cwd)?;
        let manifest = manifest.unwrap_or_default();
        return commands::apt::run(&manifest, deb, src, &cli.build_platform, dest);
    }

    if let Some(makefile) = &cli.build {
        let (manifest, project_dir) = load_manifest_optional(&cwd)?;
        let project_dir = project_dir.unwrap_or(cwd);
        let mut options = commands::generate::Options::new(makefile.clone());
        options.platforms = cli.build_platform.clone();
        options.dest = cli.dest.clone();
        options.dist = cli.dist.clone();
        options.block = cli.block.clone();
        options.build_node = cli.build_node.clone();
        options.parallel = cli.build_parallel;
        options.archive_artifacts = cli.archive_artifacts.clone();
        options.no_tools = cli.no_tools;
        options.build_local = cli.build_local;
        return commands::generate::run(&project_dir, manifest.as_ref(), &options);
    }

    anyhow::bail!("nothing to do: pass -build <makefile> or one of -go, -tar, -zip, -copy, -apt")
}

/// Try to load a manifest from the current directory upward. Returns (None, None) if not found.
fn load_manifest_optional(cwd: &Path) -> anyhow::Result<(Option<BuildManifest>, Option<PathBuf>)> {
    match BuildManifest::find_and_load(cwd)? {
        Some((manifest, dir)) => Ok((Some(manifest), Some(dir))),
        None => Ok((None, None)),
    }
}
