//! Error types for build descriptor generation.

use std::path::PathBuf;

/// Errors that abort a generation run.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// The architecture matrix or block policy could not be resolved.
    #[error(transparent)]
    Arch(#[from] buildgen_arch::ArchError),

    /// No tool entry points were found and none were expected to be missing.
    #[error("no tools to compile in {}", dir.display())]
    NoTools {
        /// The directory that was searched.
        dir: PathBuf,
    },

    /// Package metadata could not be determined.
    #[error("cannot resolve package metadata: {detail}")]
    Meta {
        /// What was missing.
        detail: String,
    },

    /// Reading the project tree or writing an output artifact failed.
    #[error("{}: {source}", path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
}

impl GenerateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerateError>;
