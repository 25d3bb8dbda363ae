//! The per-evaluation sandbox contract (§4.7.3, §4.7.4) and the trait a host
//! implements to actually run a wrapped module body.
//!
//! No JS VM is vendored here: compiling and invoking a body is exactly the
//! "sandbox escape" / "language kernel" territory `spec.md` places out of
//! scope for the core. The core's job stops at producing the wrapped body
//! text and a named bag of bindings; a host (browser `new Function(...)`,
//! or an embedded boa/v8/QuickJS) discharges `BodyEvaluator`.

use std::collections::HashMap;
use std::sync::Arc;

use builtin_registry::BuiltinModule;
use parking_lot::RwLock;
use serde_json::Value;

/// The live cell backing one module's `module.exports`. Shared (by `Arc`)
/// between the loader's execution-cache entry and every caller that
/// `require`s the module while it is still `loading`, so that a later write
/// is visible to an earlier cycle participant (§9 design note: "mutate the
/// same cell the caller holds").
pub type ExportsCell = Arc<RwLock<Value>>;

pub fn new_exports_cell() -> ExportsCell {
    Arc::new(RwLock::new(Value::Object(serde_json::Map::new())))
}

/// What a synchronous `require(spec)` call inside a module body resolves to
/// (§4.7.5): either a stable builtin module object, or another module's
/// (possibly still-`loading`) exports cell.
#[derive(Clone)]
pub enum RequireOutcome {
    Builtin(BuiltinModule),
    Module(ExportsCell),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Log,
    Warn,
    Error,
}

/// The host-provided sink backing the sandbox's `console` (§4.7.3):
/// `log/error/warn/clear`.
pub trait ConsoleSink {
    fn write(&self, level: ConsoleLevel, message: &str);
    fn clear(&self);
}

/// Buffers everything written to it; used by `module_runtime` to assemble
/// the `stdout`/`stderr` strings `execute` returns, and directly in tests.
#[derive(Default)]
pub struct VecConsole {
    lines: RwLock<Vec<(ConsoleLevel, String)>>,
}

impl VecConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(ConsoleLevel, String)> {
        self.lines.read().clone()
    }
}

impl ConsoleSink for VecConsole {
    fn write(&self, level: ConsoleLevel, message: &str) {
        self.lines.write().push((level, message.to_string()));
    }

    fn clear(&self) {
        self.lines.write().clear();
    }
}

/// Bindings the evaluator must bind into the wrapped body's scope, exactly
/// the names listed in §4.7.4: `module`/`exports` (backed by
/// `module_exports`), `require`, `__filename`, `__dirname`, `console`. The
/// "standard globals" (`Promise`, `Array`, `JSON`, …) and `process`/`Buffer`
/// emulation are assumed ambient in the host's own environment and are not
/// threaded through Rust.
pub struct SandboxBindings<'a> {
    pub filename: String,
    pub dirname: String,
    pub module_exports: ExportsCell,
    pub require: Box<dyn Fn(&str) -> Result<RequireOutcome, anyhow::Error> + 'a>,
    pub console: &'a dyn ConsoleSink,
    pub env: HashMap<String, String>,
    pub argv: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct EvalError(pub String);

/// Compiles the wrapped body text (§4.7.4) and invokes it with `bindings`.
/// Implementations are expected to surface any `module.exports = …`/
/// `exports.x = …` write made by the running body into
/// `bindings.module_exports` as it happens, not only once the body returns,
/// so a cycle participant holding the same cell observes the write.
pub trait BodyEvaluator {
    fn compile_and_run(&self, code: &str, bindings: SandboxBindings<'_>) -> Result<(), EvalError>;
}

/// Lets a single evaluator be shared (by `Arc`) across several projects'
/// loaders, the same way `module_runtime` shares one `Arc<dyn BodyEvaluator>`
/// host binding across every `Loader` it owns.
impl<T: BodyEvaluator + ?Sized> BodyEvaluator for std::sync::Arc<T> {
    fn compile_and_run(&self, code: &str, bindings: SandboxBindings<'_>) -> Result<(), EvalError> {
        (**self).compile_and_run(code, bindings)
    }
}
