//! Block/permit policy for the architecture matrix.
//!
//! A policy file is merged into the built-in default unless it sets
//! `replace = true`. Files are TOML, or JSON and YAML by extension:
//!
//! ```toml
//! block = [{ os = "plan9" }, { os = "linux", arch = "mips" }]
//! permit = []
//!
//! [tools]
//! server = [{ os = "windows" }]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::arch::Architecture;
use crate::error::{ArchError, Result};

/// One entry of a block or permit list.
///
/// The OS must match exactly (ignoring case). An empty `arch` matches every
/// CPU of that OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchPattern {
    pub os: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arch: String,
}

impl ArchPattern {
    /// Pattern matching every CPU of an OS.
    pub fn os(os: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: String::new(),
        }
    }

    /// Pattern matching a single OS/CPU pair.
    pub fn pair(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Whether this pattern matches an architecture.
    pub fn matches(&self, arch: &Architecture) -> bool {
        self.os.eq_ignore_ascii_case(&arch.os)
            && (self.arch.is_empty() || self.arch.eq_ignore_ascii_case(&arch.arch))
    }
}

fn any_match(list: &[ArchPattern], arch: &Architecture) -> bool {
    list.iter().any(|p| p.matches(arch))
}

fn merge_list(into: &mut Vec<ArchPattern>, from: Vec<ArchPattern>) {
    for p in from {
        if !into.contains(&p) {
            into.push(p);
        }
    }
}

/// Which architectures the generator may emit rules for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockPolicy {
    /// Replace the built-in policy instead of merging into it.
    #[serde(default)]
    pub replace: bool,
    /// Architectures never built.
    #[serde(default)]
    pub block: Vec<ArchPattern>,
    /// Per-tool blocks, keyed by lowercase tool name.
    #[serde(default)]
    pub tools: BTreeMap<String, Vec<ArchPattern>>,
    /// When non-empty, only these architectures are built and `block` is ignored.
    #[serde(default)]
    pub permit: Vec<ArchPattern>,
}

impl BlockPolicy {
    /// The built-in policy: no mobile or web targets, and no openbsd/mips64
    /// whose symbol relocation is broken in the toolchain.
    pub fn builtin() -> Self {
        Self {
            block: vec![
                ArchPattern::os("android"),
                ArchPattern::os("ios"),
                ArchPattern::os("js"),
                ArchPattern::pair("openbsd", "mips64"),
            ],
            ..Self::default()
        }
    }

    /// Merge `other` into this policy. A replacing policy wins outright.
    pub fn merge(mut self, other: BlockPolicy) -> Self {
        let other = other.normalized();
        if other.replace {
            return other;
        }
        merge_list(&mut self.block, other.block);
        for (tool, list) in other.tools {
            merge_list(self.tools.entry(tool).or_default(), list);
        }
        merge_list(&mut self.permit, other.permit);
        self
    }

    fn normalized(mut self) -> Self {
        self.tools = std::mem::take(&mut self.tools)
            .into_iter()
            .fold(BTreeMap::new(), |mut acc, (k, v)| {
                merge_list(acc.entry(k.to_lowercase()).or_default(), v);
                acc
            });
        self
    }

    /// Whether an architecture is excluded from the matrix.
    ///
    /// A non-empty permit list is authoritative: the block list is not
    /// consulted at all.
    pub fn is_blocked(&self, arch: &Architecture) -> bool {
        if !self.permit.is_empty() {
            return !any_match(&self.permit, arch);
        }
        any_match(&self.block, arch)
    }

    /// Whether a single tool must not be compiled for an architecture.
    /// Independent of the permit list.
    pub fn is_tool_blocked(&self, arch: &Architecture, tool: &str) -> bool {
        self.tools
            .get(&tool.to_lowercase())
            .is_some_and(|list| any_match(list, arch))
    }

    /// Parse a policy from TOML.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let policy: BlockPolicy = toml::from_str(s)?;
        Ok(policy.normalized())
    }

    /// Parse a policy from JSON.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let policy: BlockPolicy = serde_json::from_str(s)?;
        Ok(policy.normalized())
    }

    /// Parse a policy from YAML.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let policy: BlockPolicy = serde_yaml::from_str(s)?;
        Ok(policy.normalized())
    }

    /// Load a policy file. `.json` files are read as JSON, `.yaml`/`.yml` as
    /// YAML, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ArchError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading block policy");
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }
}
