//! Dispatches between the registered transpiler capability (for TS/JSX) and
//! the built-in normalizer (for plain ESM/CJS), content-addressing the
//! result through an [`artifact_cache::ArtifactCache`].

pub mod driver;
pub mod hash;
pub mod registry;
pub mod transpiler;

pub use driver::{DriveResult, TranspilerDriver};
pub use hash::content_hash;
pub use registry::TranspilerRegistry;
pub use transpiler::{TranspileError, TranspileOptions, TranspileOutput, Transpiler};
