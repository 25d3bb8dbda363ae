use thiserror::Error;

use transpiler_driver::TranspileError;

/// Error kinds from §7. `CacheIOError` never reaches this type: the
/// artifact cache and transpiler driver log it internally and the caller
/// proceeds treating the access as a miss, per the spec's table.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Cannot find module '{specifier}' from {from}")]
    CannotFindModule { specifier: String, from: String },

    #[error("module '{specifier}' (required from {from}) was not pre-loaded")]
    NotPreloaded { specifier: String, from: String },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("{path} is binary and cannot be executed")]
    BinaryNotExecutable { path: String },

    #[error(transparent)]
    Transpile(#[from] TranspileError),

    #[error("evaluation of {path} failed: {source}")]
    Eval { path: String, source: anyhow::Error },

    #[error("resolving '{specifier}' from {from} failed: {source}")]
    Resolve { specifier: String, from: String, source: anyhow::Error },

    #[error("reading {path} failed: {source}")]
    Store { path: String, source: anyhow::Error },
}
