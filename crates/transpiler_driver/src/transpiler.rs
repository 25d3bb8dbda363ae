use thiserror::Error;

/// Options handed to an external [`Transpiler`] capability. Owned (not
/// borrowed) so a driver can run the call on a worker thread with a timeout
/// without fighting lifetimes across the thread boundary.
#[derive(Debug, Clone)]
pub struct TranspileOptions {
    pub file_path: String,
    pub is_typescript: bool,
    pub is_es_module: bool,
    pub is_jsx: bool,
}

#[derive(Debug, Clone)]
pub struct TranspileOutput {
    pub code: String,
    pub map: Option<String>,
    pub dependencies: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum TranspileError {
    #[error("transpilation of {path} failed: {reason}")]
    Failed { path: String, reason: String },
    #[error("transpilation of {path} timed out after {timeout_secs}s")]
    Timeout { path: String, timeout_secs: u64 },
}

/// An externally supplied capability that turns TypeScript/JSX source into
/// an evaluable body. The core never implements one itself (§4.5, §9 design
/// note): a host registers one per extension it wants handled.
pub trait Transpiler: Send + Sync {
    fn extensions(&self) -> &[&str];
    fn transpile(&self, code: &str, opts: TranspileOptions) -> Result<TranspileOutput, TranspileError>;
}
