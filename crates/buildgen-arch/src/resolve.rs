//! Resolution of the architecture matrix from the toolchain.

use std::process::Command;

use tracing::debug;

use crate::arch::Architecture;
use crate::error::{ArchError, Result};
use crate::policy::BlockPolicy;

/// ARM revisions each 32-bit ARM entry is expanded into.
pub const ARM_REVISIONS: [&str; 2] = ["6", "7"];

/// Something that can list every `(os, arch)` pair the toolchain supports.
pub trait PlatformSource {
    /// List the supported platforms, in any order.
    fn platforms(&self) -> Result<Vec<Architecture>>;
}

/// Queries `go tool dist list -json`.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    program: String,
}

impl GoToolchain {
    /// Use the `go` binary found on `PATH`.
    pub fn new() -> Self {
        Self::with_program("go")
    }

    /// Use a specific `go` binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GoToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformSource for GoToolchain {
    fn platforms(&self) -> Result<Vec<Architecture>> {
        let command = format!("{} tool dist list -json", self.program);
        debug!(%command, "querying toolchain platforms");
        let output = Command::new(&self.program)
            .args(["tool", "dist", "list", "-json"])
            .output()
            .map_err(|e| ArchError::Toolchain {
                command: command.clone(),
                detail: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(ArchError::Toolchain {
                command,
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_platform_list(&String::from_utf8_lossy(&output.stdout))
    }
}

/// A fixed platform list, for tests and offline generation.
#[derive(Debug, Clone, Default)]
pub struct StaticPlatforms(pub Vec<Architecture>);

impl PlatformSource for StaticPlatforms {
    fn platforms(&self) -> Result<Vec<Architecture>> {
        Ok(self.0.clone())
    }
}

/// Parse the JSON array printed by the toolchain's platform query.
pub fn parse_platform_list(json: &str) -> Result<Vec<Architecture>> {
    let platforms: Vec<Architecture> = serde_json::from_str(json)?;
    Ok(platforms)
}

/// Turns a toolchain platform list into the permitted architecture matrix.
#[derive(Debug, Clone)]
pub struct Resolver {
    policy: BlockPolicy,
}

impl Resolver {
    /// Create a resolver applying the given policy.
    pub fn new(policy: BlockPolicy) -> Self {
        Self { policy }
    }

    /// The policy this resolver applies.
    pub fn policy(&self) -> &BlockPolicy {
        &self.policy
    }

    /// Query a source and resolve its list.
    pub fn resolve(&self, source: &dyn PlatformSource) -> Result<Vec<Architecture>> {
        let platforms = source.platforms()?;
        let matrix = self.resolve_list(platforms);
        debug!(count = matrix.len(), "resolved architecture matrix");
        Ok(matrix)
    }

    /// Sort by OS then CPU, drop duplicates and blocked entries, and expand
    /// every 32-bit ARM entry into adjacent revision 6 and 7 entries.
    pub fn resolve_list(&self, mut platforms: Vec<Architecture>) -> Vec<Architecture> {
        platforms.sort_by(|a, b| a.os.cmp(&b.os).then_with(|| a.arch.cmp(&b.arch)));
        platforms.dedup();

        let mut matrix = Vec::with_capacity(platforms.len() + 2);
        for arch in platforms {
            if self.policy.is_blocked(&arch) {
                continue;
            }
            if arch.is_arm32() && arch.arm.is_empty() {
                matrix.extend(ARM_REVISIONS.iter().map(|rev| arch.with_arm(*rev)));
            } else {
                matrix.push(arch);
            }
        }
        matrix
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(BlockPolicy::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ArchPattern;

    const DIST_LIST: &str = r#"[
        {"GOOS":"windows","GOARCH":"amd64","CgoSupported":true,"FirstClass":true},
        {"GOOS":"linux","GOARCH":"arm","CgoSupported":true,"FirstClass":true},
        {"GOOS":"android","GOARCH":"arm64","CgoSupported":true,"FirstClass":false},
        {"GOOS":"linux","GOARCH":"amd64","CgoSupported":true,"FirstClass":true},
        {"GOOS":"darwin","GOARCH":"arm64","CgoSupported":true,"FirstClass":true},
        {"GOOS":"linux","GOARCH":"amd64","CgoSupported":true,"FirstClass":true}
    ]"#;

    fn targets(v: &[Architecture]) -> Vec<String> {
        v.iter().map(Architecture::target).collect()
    }

    #[test]
    fn resolve_sorts_filters_and_expands() {
        let platforms = parse_platform_list(DIST_LIST).unwrap();
        let matrix = Resolver::default().resolve(&StaticPlatforms(platforms)).unwrap();
        assert_eq!(
            targets(&matrix),
            [
                "darwin_arm64",
                "linux_amd64",
                "linux_arm6",
                "linux_arm7",
                "windows_amd64"
            ]
        );
    }

    #[test]
    fn blocked_arm_is_not_expanded() {
        let policy = BlockPolicy {
            block: vec![ArchPattern::pair("linux", "arm")],
            ..Default::default()
        };
        let matrix = Resolver::new(policy).resolve_list(vec![
            Architecture::new("linux", "arm"),
            Architecture::new("linux", "arm64"),
        ]);
        assert_eq!(targets(&matrix), ["linux_arm64"]);
    }

    #[test]
    fn permit_list_restricts_matrix() {
        let policy = BlockPolicy::builtin().merge(BlockPolicy {
            permit: vec![ArchPattern::os("linux")],
            ..Default::default()
        });
        let platforms = parse_platform_list(DIST_LIST).unwrap();
        let matrix = Resolver::new(policy).resolve_list(platforms);
        assert_eq!(targets(&matrix), ["linux_amd64", "linux_arm6", "linux_arm7"]);
    }

    #[test]
    fn arm_expansion_keeps_position() {
        let matrix = Resolver::new(BlockPolicy::default()).resolve_list(vec![
            Architecture::new("netbsd", "arm"),
            Architecture::new("linux", "arm"),
            Architecture::new("freebsd", "386"),
        ]);
        assert_eq!(
            targets(&matrix),
            [
                "freebsd_386",
                "linux_arm6",
                "linux_arm7",
                "netbsd_arm6",
                "netbsd_arm7"
            ]
        );
    }

    #[test]
    fn malformed_list_is_fatal() {
        assert!(parse_platform_list("{\"GOOS\": 1}").is_err());
        assert!(parse_platform_list("not json").is_err());
    }

    #[test]
    fn missing_toolchain_is_fatal() {
        let source = GoToolchain::with_program("/nonexistent/go-binary");
        let err = Resolver::default().resolve(&source).unwrap_err();
        assert!(matches!(err, ArchError::Toolchain { .. }));
    }
}
