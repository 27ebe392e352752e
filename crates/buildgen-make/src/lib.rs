//! Makefile generation for buildgen.
//!
//! Two layers:
//! - [`makefile::Makefile`]: an arena of render nodes (comments, variables,
//!   rules, recipe lines) serialized in insertion order.
//! - [`target::TargetGraph`]: named build targets with render commands and
//!   child targets, rendered onto a `Makefile`.

pub mod makefile;
pub mod target;

pub use makefile::{Cursor, Makefile, NodeId, NodeKind, PHONY};
pub use target::{RenderCommand, Target, TargetBuilder, TargetGraph, TargetId};
