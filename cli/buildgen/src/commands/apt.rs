//! `buildgen -apt <deb> -apt-src <dir> -build-platform <platform> -d <dir>`:
//! build a Debian package from an architecture's build tree.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use buildgen_core::DebianConfig;

use super::copy::copy_tree;
use crate::manifest::BuildManifest;

/// Where the package installs the build tree.
const INSTALL_ROOT: &str = "usr/local";

/// Lay out the package tree in `dest`: the build tree under
/// `usr/local/<name>` and the `DEBIAN/control` file. Any previous content of
/// `dest` is removed.
pub fn stage(config: &DebianConfig, src: &Path, platform: &str, dest: &Path) -> Result<PathBuf> {
    let control = config
        .control(platform)
        .with_context(|| format!("platform {platform:?} has no architecture"))?;

    if dest.exists() {
        fs::remove_dir_all(dest).with_context(|| format!("removing {}", dest.display()))?;
    }
    copy_tree(src, &dest.join(INSTALL_ROOT).join(&config.name))?;

    let control_file = dest.join("DEBIAN").join("control");
    if let Some(parent) = control_file.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(&control_file, control)
        .with_context(|| format!("writing {}", control_file.display()))?;
    Ok(control_file)
}

/// Stage the package in `dest`, build `deb` with `dpkg` and lint it if the
/// manifest asks for it.
pub fn run(manifest: &BuildManifest, deb: &Path, src: &Path, platform: &str, dest: &Path) -> Result<()> {
    let version = manifest.package.version.clone().unwrap_or_else(|| {
        std::env::var("BUILD_VERSION")
            .map(|v| v.trim_matches('"').to_string())
            .unwrap_or_default()
    });
    let Some(config) = manifest.debian_for(&version) else {
        bail!("no [debian] section in buildgen.toml");
    };

    super::label("APT", deb.display());
    stage(&config, src, platform, dest)?;

    let mut dpkg = Command::new("dpkg");
    dpkg.arg("--build").arg(dest).arg(deb);
    super::run_command(dpkg)?;

    if config.lintian {
        super::label("LINTIAN", deb.display());
        let mut lintian = Command::new("lintian");
        lintian.arg(deb);
        super::run_command(lintian)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DebianConfig {
        DebianConfig {
            name: "widget".into(),
            version: "1.0".into(),
            release: "1".into(),
            maintainer: "Ops <ops@example.com>".into(),
            description: "A widget".into(),
            ..Default::default()
        }
    }

    #[test]
    fn stages_tree_and_control_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("builds/linux/arm7");
        fs::create_dir_all(src.join("bin")).unwrap();
        fs::write(src.join("bin/widget"), "binary").unwrap();

        let dest = dir.path().join("builds/apt/widget_1.0-1_arm7");
        fs::create_dir_all(dest.join("stale")).unwrap();

        let control = stage(&config(), &src, "linux:arm:7", &dest).unwrap();
        assert!(!dest.join("stale").exists());
        assert_eq!(
            fs::read_to_string(dest.join("usr/local/widget/bin/widget")).unwrap(),
            "binary"
        );
        let control = fs::read_to_string(control).unwrap();
        assert!(control.starts_with("Package: widget\nVersion: 1.0\n"));
        assert!(control.ends_with("Architecture: armhf\n"));
    }

    #[test]
    fn platform_without_cpu_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = stage(&config(), dir.path(), "linux", &dir.path().join("out")).unwrap_err();
        assert!(err.to_string().contains("has no architecture"));
    }

    #[test]
    fn requires_debian_section() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(
            &BuildManifest::default(),
            &dir.path().join("x.deb"),
            dir.path(),
            "linux:amd64:",
            &dir.path().join("out"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("[debian]"));
    }
}
