//! Error types for architecture resolution.

use std::path::PathBuf;

/// Errors that can occur while resolving the architecture matrix.
#[derive(Debug, thiserror::Error)]
pub enum ArchError {
    /// The toolchain platform query could not be run or exited unsuccessfully.
    #[error("toolchain query `{command}` failed: {detail}")]
    Toolchain {
        /// The command line that was run.
        command: String,
        /// What went wrong.
        detail: String,
    },

    /// The toolchain returned something that is not a platform list.
    #[error("malformed platform list: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error in a block policy.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML deserialization error in a block policy.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error reading a policy file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Policy file not found.
    #[error("block policy not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },
}

/// Result type for architecture operations.
pub type Result<T> = std::result::Result<T, ArchError>;
