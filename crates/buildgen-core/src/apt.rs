//! Debian package extension.
//!
//! Configured by the `[debian]` manifest section. For every permitted
//! architecture it adds a `.deb` target under `<dest>/apt` built from that
//! architecture's output tree, plus a phony `<token>_apt` target.

use std::path::Path;

use buildgen_arch::Architecture;
use buildgen_make::TargetBuilder;
use serde::{Deserialize, Serialize};

use crate::hooks::Extension;
use crate::meta::Meta;

/// `[debian]` section of `buildgen.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebianConfig {
    pub name: String,
    /// Defaults to the package version.
    pub version: String,
    pub release: String,
    pub maintainer: String,
    pub homepage: String,
    pub description: String,
    /// Platform labels (`os:arch:armrev`) to package. Empty packages all.
    pub architectures: Vec<String>,
    pub depends: Vec<String>,
    /// Run `lintian` on the built package.
    pub lintian: bool,
}

impl DebianConfig {
    /// This config with an empty version replaced by `version`.
    pub fn with_version_fallback(&self, version: &str) -> Self {
        let mut config = self.clone();
        if config.version.is_empty() {
            config.version = version.to_string();
        }
        config
    }

    /// Package file stem: `name_version-release_cpu`.
    pub fn package_name(&self, cpu: &str) -> String {
        format!("{}_{}-{}_{}", self.name, self.version, self.release, cpu)
    }

    /// Whether an architecture should be packaged.
    pub fn permits(&self, arch: &Architecture) -> bool {
        self.architectures.is_empty()
            || self.architectures.iter().any(|p| arch.matches_platform(p))
    }

    /// The `DEBIAN/control` file for a platform label, or `None` if the
    /// label has no CPU field.
    pub fn control(&self, platform: &str) -> Option<String> {
        let architecture = debian_arch(platform)?;
        let mut control = format!(
            "Package: {}\nVersion: {}\nMaintainer: {}\nHomepage: {}\nDescription: {}\n",
            self.name, self.version, self.maintainer, self.homepage, self.description
        );
        if !self.depends.is_empty() {
            control.push_str(&format!("Depends: {}\n", self.depends.join(", ")));
        }
        control.push_str(&format!("Architecture: {architecture}\n"));
        Some(control)
    }

    /// The extension adding package targets, with outputs under `dest`.
    pub fn extension(self, dest: impl Into<String>) -> AptExtension {
        AptExtension {
            config: self,
            dest: dest.into(),
        }
    }
}

/// Debian architecture name for a platform label.
pub fn debian_arch(platform: &str) -> Option<String> {
    let mut parts = platform.split(':');
    let _os = parts.next()?;
    let cpu = parts.next().filter(|c| !c.is_empty())?;
    let arm = parts.next().unwrap_or("");
    let name = match (cpu, arm) {
        ("386", _) => "i386".to_string(),
        ("arm", "6") => "armel".to_string(),
        ("arm", "7") => "armhf".to_string(),
        ("ppc64le", _) => "ppc64el".to_string(),
        ("mipsle", _) => "mipsel".to_string(),
        ("mips64le", _) => "mips64el".to_string(),
        (cpu, arm) => format!("{cpu}{arm}"),
    };
    Some(name)
}

/// Adds `.deb` targets for each architecture.
#[derive(Debug, Clone)]
pub struct AptExtension {
    config: DebianConfig,
    dest: String,
}

impl Extension for AptExtension {
    fn apply(&self, arch: &Architecture, target: &mut TargetBuilder<'_>, meta: &Meta) {
        if !self.config.permits(arch) {
            return;
        }

        let config = self.config.with_version_fallback(&meta.version);
        let dest_dir = format!("{}/apt/{}", self.dest, config.package_name(&arch.cpu()));
        let deb = format!("{dest_dir}.deb");
        let source = arch.base_dir(Path::new(&self.dest)).display().to_string();
        let platform = arch.platform();
        let dist = format!("{}_dist", arch.target());

        target
            .target(&deb, &[&dist])
            .echo("DIST APT", &deb)
            .build_tool(
                "-apt",
                &[&deb, "-apt-src", &source, "-build-platform", &platform, "-d", &dest_dir],
            )
            .end();

        target
            .phony_target(&format!("{}_apt", arch.target()), &[&dist, &deb])
            .end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildgen_make::{Makefile, TargetGraph};

    fn config() -> DebianConfig {
        DebianConfig {
            name: "widget".into(),
            release: "1".into(),
            maintainer: "Ops <ops@example.com>".into(),
            description: "A widget".into(),
            ..Default::default()
        }
    }

    #[test]
    fn debian_architectures() {
        assert_eq!(debian_arch("linux:amd64:").as_deref(), Some("amd64"));
        assert_eq!(debian_arch("linux:arm:7").as_deref(), Some("armhf"));
        assert_eq!(debian_arch("linux:arm:6").as_deref(), Some("armel"));
        assert_eq!(debian_arch("linux:386").as_deref(), Some("i386"));
        assert_eq!(debian_arch("linux"), None);
        assert_eq!(debian_arch("linux::"), None);
    }

    #[test]
    fn control_file() {
        let mut c = config().with_version_fallback("2.0");
        c.depends = vec!["libc6".into(), "ca-certificates".into()];
        assert_eq!(
            c.control("linux:arm64:").unwrap(),
            "Package: widget\nVersion: 2.0\nMaintainer: Ops <ops@example.com>\nHomepage: \n\
             Description: A widget\nDepends: libc6, ca-certificates\nArchitecture: arm64\n"
        );
    }

    #[test]
    fn explicit_version_is_kept() {
        let mut c = config();
        c.version = "3.1".into();
        assert_eq!(c.with_version_fallback("9").version, "3.1");
    }

    #[test]
    fn architecture_filter() {
        let mut c = config();
        assert!(c.permits(&Architecture::new("darwin", "arm64")));
        c.architectures = vec!["linux:amd64:".into()];
        assert!(c.permits(&Architecture::new("linux", "amd64")));
        assert!(!c.permits(&Architecture::new("linux", "arm64")));
    }

    #[test]
    fn extension_adds_package_targets() {
        let ext = config().extension("builds");
        let arch = Architecture::new("linux", "arm").with_arm("7");
        let meta = Meta::new("widget", "2.0", "buildgen");

        let mut graph = TargetGraph::new();
        let mut mf = Makefile::new();
        let root = mf.root();
        let mut branch = graph.branch();
        ext.apply(&arch, &mut branch, &meta);
        branch.build(&mut mf, root);

        assert_eq!(
            mf.build(),
            "\nbuilds/apt/widget_2.0-1_arm7.deb: linux_arm7_dist\n\
             \t@echo \"DIST APT builds/apt/widget_2.0-1_arm7.deb\";\\\n\
             \t@echo \"BUILD    -apt builds/apt/widget_2.0-1_arm7.deb\";\\\n\
             \t@$(BUILD) -apt builds/apt/widget_2.0-1_arm7.deb -apt-src builds/linux/arm7 \
             -build-platform linux:arm:7 -d builds/apt/widget_2.0-1_arm7\n\
             \n.PHONY: linux_arm7_apt\n\
             \nlinux_arm7_apt: linux_arm7_dist builds/apt/widget_2.0-1_arm7.deb"
        );
    }

    #[test]
    fn filtered_architecture_adds_nothing() {
        let mut c = config();
        c.architectures = vec!["linux:amd64:".into()];
        let ext = c.extension("builds");
        let mut graph = TargetGraph::new();
        let mut branch = graph.branch();
        ext.apply(
            &Architecture::new("windows", "amd64"),
            &mut branch,
            &Meta::new("w", "1", "b"),
        );
        assert!(branch.graph().children(branch.branch_id()).is_empty());
    }

    #[test]
    fn manifest_section() {
        let c: DebianConfig = toml::from_str(
            r#"
name = "widget"
release = "2"
architectures = ["linux:amd64:"]
lintian = true
"#,
        )
        .unwrap();
        assert!(c.lintian);
        assert_eq!(c.package_name("amd64"), "widget_-2_amd64");
    }
}
