//! Architecture matrix model and resolution for buildgen.
//!
//! The matrix is assembled from three pieces:
//! - **Platform source:** the toolchain's list of `(os, arch)` pairs
//! - **Block policy:** global block/permit lists plus per-tool blocks
//! - **Resolver:** sorts, filters and expands ARM 32-bit into revisions 6 and 7

pub mod arch;
pub mod error;
pub mod policy;
pub mod resolve;

pub use arch::Architecture;
pub use error::{ArchError, Result};
pub use policy::{ArchPattern, BlockPolicy};
pub use resolve::{GoToolchain, PlatformSource, Resolver, StaticPlatforms};
