//! Build descriptor generation for buildgen.
//!
//! The [`Generator`] resolves the architecture matrix, lays out one group of
//! rules per OS and architecture, lets registered hooks add their own targets,
//! and renders the Makefile, the platform table and the Jenkinsfile.
//!
//! Hooks are the only extension point:
//! - [`Extension`]: called once per architecture with a fresh target branch
//! - [`Documentation`]: called once for the `docs` rule
//! - [`PipelineHook`]: called once with the Jenkinsfile `node` block

pub mod apt;
pub mod config;
pub mod error;
pub mod generate;
pub mod hooks;
pub mod meta;
pub mod platforms;
pub mod tools;

pub use apt::DebianConfig;
pub use config::{BuildConfig, PackageConfig};
pub use error::{GenerateError, Result};
pub use generate::{Generator, Outputs};
pub use hooks::{Chain, Documentation, Extension, PipelineHook};
pub use meta::Meta;
pub use platforms::platform_table;
pub use tools::discover_tools;
