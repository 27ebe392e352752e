//! Jenkins pipeline generation for buildgen.
//!
//! - [`jenkinsfile::Jenkinsfile`]: an arena of scripted-pipeline nodes
//!   (blocks, properties, stages, shell steps) rendered with four-space
//!   indentation.
//! - [`stages::StageComposer`]: groups the architecture matrix into build
//!   stages, either one stage per architecture or one parallel stage per OS.

pub mod jenkinsfile;
pub mod stages;

pub use jenkinsfile::{Cursor, Jenkinsfile, NodeId, NodeKind};
pub use stages::{OsStage, StageComposer, StageMode, DEFAULT_MAKEFILE};
