//! Status-tagged wrapper for the `module_runtime_wasm` boundary (§7, §9.2):
//! `js_err::JsErr`'s napi-era shape carried over for a `wasm-bindgen` host
//! instead of a `napi::Error` one.

use std::fmt::Display;

use anyhow::Error;
use module_loader::LoaderError;

/// One variant per row of the error-kind table (§7), plus the generic
/// catch-all `js_err::Status::GenericFailure` already covers for anything
/// outside that table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RuntimeErrorStatus {
    CannotFindModule,
    NotPreloaded,
    FileNotFound,
    BinaryNotExecutable,
    TranspileError,
    CacheIoError,
    EvalFailure,
    ResolveFailure,
    GenericFailure,
}

impl Display for RuntimeErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RuntimeErrorStatus::CannotFindModule => "cannot_find_module",
                RuntimeErrorStatus::NotPreloaded => "not_preloaded",
                RuntimeErrorStatus::FileNotFound => "file_not_found",
                RuntimeErrorStatus::BinaryNotExecutable => "binary_not_executable",
                RuntimeErrorStatus::TranspileError => "transpile_error",
                RuntimeErrorStatus::CacheIoError => "cache_io_error",
                RuntimeErrorStatus::EvalFailure => "eval_failure",
                RuntimeErrorStatus::ResolveFailure => "resolve_failure",
                RuntimeErrorStatus::GenericFailure => "generic_failure",
            }
        )
    }
}

/// Equivalent to `js_err::JsErr`, but declared separately so crates that get
/// compiled without the `wasm` feature (e.g. under `cargo test` on a host
/// target) never pull in `wasm-bindgen`.
#[derive(Debug)]
pub struct WasmErr {
    status: RuntimeErrorStatus,
    err: Error,
}

impl WasmErr {
    pub fn new(status: RuntimeErrorStatus, err: impl Into<Error>) -> Self {
        let err = err.into();
        if err.is::<WasmErr>() {
            let inner = err.downcast::<WasmErr>().unwrap();
            Self { status: inner.status, err: inner.err }
        } else {
            Self { status, err }
        }
    }

    pub fn cannot_find_module(err: impl Into<Error>) -> Self {
        Self::new(RuntimeErrorStatus::CannotFindModule, err)
    }
    pub fn not_preloaded(err: impl Into<Error>) -> Self {
        Self::new(RuntimeErrorStatus::NotPreloaded, err)
    }
    pub fn file_not_found(err: impl Into<Error>) -> Self {
        Self::new(RuntimeErrorStatus::FileNotFound, err)
    }
    pub fn binary_not_executable(err: impl Into<Error>) -> Self {
        Self::new(RuntimeErrorStatus::BinaryNotExecutable, err)
    }
    pub fn transpile_error(err: impl Into<Error>) -> Self {
        Self::new(RuntimeErrorStatus::TranspileError, err)
    }
    pub fn cache_io_error(err: impl Into<Error>) -> Self {
        Self::new(RuntimeErrorStatus::CacheIoError, err)
    }
    pub fn eval_failure(err: impl Into<Error>) -> Self {
        Self::new(RuntimeErrorStatus::EvalFailure, err)
    }
    pub fn resolve_failure(err: impl Into<Error>) -> Self {
        Self::new(RuntimeErrorStatus::ResolveFailure, err)
    }
    pub fn generic_failure(err: impl Into<Error>) -> Self {
        Self::new(RuntimeErrorStatus::GenericFailure, err)
    }

    pub fn status(&self) -> RuntimeErrorStatus {
        self.status
    }

    pub fn message(&self) -> String {
        format!("{:#}", self.err)
    }
}

impl Display for WasmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.err)
    }
}

impl std::error::Error for WasmErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.err.source()
    }
}

impl From<LoaderError> for WasmErr {
    fn from(err: LoaderError) -> Self {
        let status = match &err {
            LoaderError::CannotFindModule { .. } => RuntimeErrorStatus::CannotFindModule,
            LoaderError::NotPreloaded { .. } => RuntimeErrorStatus::NotPreloaded,
            LoaderError::FileNotFound { .. } => RuntimeErrorStatus::FileNotFound,
            LoaderError::BinaryNotExecutable { .. } => RuntimeErrorStatus::BinaryNotExecutable,
            LoaderError::Transpile(_) => RuntimeErrorStatus::TranspileError,
            LoaderError::Eval { .. } => RuntimeErrorStatus::EvalFailure,
            LoaderError::Resolve { .. } => RuntimeErrorStatus::ResolveFailure,
            LoaderError::Store { .. } => RuntimeErrorStatus::CacheIoError,
        };
        WasmErr::new(status, anyhow::Error::new(err))
    }
}

#[cfg(feature = "wasm")]
mod wasm {
    use wasm_bindgen::JsValue;

    use super::WasmErr;

    impl From<WasmErr> for JsValue {
        fn from(val: WasmErr) -> Self {
            JsValue::from_str(&format!("[{}] {}", val.status(), val.message()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_loader_error_with_matching_status() {
        let err = LoaderError::FileNotFound { path: "/x.js".to_string() };
        let wrapped: WasmErr = err.into();
        assert_eq!(wrapped.status(), RuntimeErrorStatus::FileNotFound);
        assert!(wrapped.message().contains("/x.js"));
    }

    #[test]
    fn new_flattens_a_nested_wasm_err() {
        let inner = WasmErr::not_preloaded(anyhow::anyhow!("boom"));
        let outer = WasmErr::generic_failure(anyhow::Error::new(inner));
        assert_eq!(outer.status(), RuntimeErrorStatus::NotPreloaded);
    }
}
