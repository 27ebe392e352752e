//! A single entry of the architecture matrix.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One `(os, cpu, arm revision)` triple the build can target.
///
/// Field order matters: the derived ordering sorts by OS, then CPU, then
/// ARM revision, which is the canonical matrix order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Architecture {
    /// Operating system, e.g. `linux`.
    #[serde(rename = "GOOS")]
    pub os: String,
    /// CPU architecture, e.g. `amd64`.
    #[serde(rename = "GOARCH")]
    pub arch: String,
    /// ARM revision for 32-bit ARM (`6` or `7`), empty otherwise.
    #[serde(rename = "GOARM", default, skip_serializing_if = "String::is_empty")]
    pub arm: String,
}

impl Architecture {
    /// Create an architecture without an ARM revision.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            arm: String::new(),
        }
    }

    /// Create a copy of this architecture with the given ARM revision.
    pub fn with_arm(&self, revision: impl Into<String>) -> Self {
        Self {
            arm: revision.into(),
            ..self.clone()
        }
    }

    /// The architecture of the machine running the generator.
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        Self::new(os, go_arch(std::env::consts::ARCH, cfg!(target_endian = "little")))
    }

    /// CPU token including the ARM revision, e.g. `amd64` or `arm7`.
    pub fn cpu(&self) -> String {
        format!("{}{}", self.arch, self.arm)
    }

    /// Canonical rule-name token, e.g. `linux_arm7`.
    pub fn target(&self) -> String {
        format!("{}_{}{}", self.os, self.arch, self.arm)
    }

    /// Platform label `os:arch:armrev` as passed to `-build-platform`.
    pub fn platform(&self) -> String {
        format!("{}:{}:{}", self.os, self.arch, self.arm)
    }

    /// Whether this is the Windows platform.
    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    /// Whether the CPU field is the generic 32-bit ARM family.
    pub fn is_arm32(&self) -> bool {
        self.arch == "arm"
    }

    /// Output base directory for this architecture under `dest`.
    pub fn base_dir(&self, dest: &Path) -> PathBuf {
        dest.join(&self.os).join(self.cpu())
    }

    /// Path of a compiled tool binary for this architecture.
    pub fn tool(&self, dest: &Path, tool: &str) -> PathBuf {
        let bin = self.base_dir(dest).join("bin");
        if self.is_windows() {
            bin.join(format!("{tool}.exe"))
        } else {
            bin.join(tool)
        }
    }

    /// Whether a `-build-platform` token names this architecture exactly,
    /// either by platform label (trailing colons optional) or rule token.
    pub fn matches_platform(&self, token: &str) -> bool {
        let token = token.trim();
        if token.is_empty() {
            return false;
        }
        let label = self.platform();
        token == label || token == label.trim_end_matches(':') || token == self.target()
    }
}

/// Go's name for a Rust target architecture.
fn go_arch(arch: &str, little_endian: bool) -> &str {
    match (arch, little_endian) {
        ("x86_64", _) => "amd64",
        ("x86", _) => "386",
        ("aarch64", _) => "arm64",
        ("powerpc", _) => "ppc",
        ("powerpc64", true) => "ppc64le",
        ("powerpc64", false) => "ppc64",
        ("mips", true) => "mipsle",
        ("mips64", true) => "mips64le",
        ("loongarch64", _) => "loong64",
        ("wasm32", _) => "wasm",
        (other, _) => other,
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}{}", self.os, self.arch, self.arm)
    }
}
