//! Browser entrypoint (§9.2): a thin `#[wasm_bindgen]` shell that owns one
//! [`module_runtime::Runtime`] and adapts its host-capability seams
//! (`FileStore`, `BodyEvaluator`, `ConsoleSink`) onto plain JS functions.
//! Mirrors `good_fences_napi`/`napi_root`'s "thin wrapper re-exporting a
//! pure-Rust crate's API through one binding layer" shape, retargeted from
//! napi to wasm-bindgen since the host here is a browser, not Node.
//!
//! Not ported: [`transpiler_driver::TranspilerDriver`]'s per-transpile
//! timeout runs the transpiler on a worker OS thread (`std::thread::spawn` +
//! `mpsc::recv_timeout`), which both requires atomics+threads support
//! `wasm32-unknown-unknown` doesn't have by default and would need a
//! `Transpiler` impl holding a `js_sys::Function` to be `Send`, which it
//! cannot be. This binding therefore runs with an empty
//! [`transpiler_driver::TranspilerRegistry`] — `.js`/`.mjs`/`.cjs` sources
//! still get the built-in ESM/CJS normalizer, but `.ts`/`.tsx`/`.jsx` sources
//! fail with "no transpiler registered" until a non-thread-based timeout
//! mechanism is built for this target.

mod js_console;
mod js_evaluator;
mod js_store;

use std::sync::Arc;

use builtin_registry::BuiltinRegistry;
use js_sys::Function;
use module_runtime::{ExecuteOptions, Runtime, RuntimeConfig};
use runtime_err::WasmErr;
use runtime_logger::VecLogger;
use transpiler_driver::TranspilerRegistry;
use virtual_store::FileStore;
use wasm_bindgen::prelude::*;

use js_console::JsConsole;
use js_evaluator::JsBodyEvaluator;
use js_store::JsFileStore;

/// Installs `console.error`-backed panic reporting; call once from JS before
/// constructing a [`ModuleRuntime`].
#[wasm_bindgen(js_name = initPanicHook)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

#[wasm_bindgen]
pub struct ModuleRuntime {
    inner: Runtime<'static, Arc<VecLogger>, Arc<JsBodyEvaluator>>,
}

#[wasm_bindgen]
impl ModuleRuntime {
    /// `store` must expose `read(project, path)`, `listByPrefix(project,
    /// prefix)`, `create(project, file)`, `save(project, path, content)`,
    /// `delete(project, path)`. `compileAndRun(code, bindings)` discharges
    /// [`module_loader::BodyEvaluator`] (§4.7.3).
    #[wasm_bindgen(constructor)]
    pub fn new(
        read_fn: Function,
        list_by_prefix_fn: Function,
        create_fn: Function,
        save_fn: Function,
        delete_fn: Function,
        compile_and_run_fn: Function,
    ) -> ModuleRuntime {
        let store: &'static dyn FileStore =
            Box::leak(Box::new(JsFileStore::new(read_fn, list_by_prefix_fn, create_fn, save_fn, delete_fn)));
        let evaluator = Arc::new(JsBodyEvaluator::new(compile_and_run_fn));
        let logger = Arc::new(VecLogger::new());

        let inner = Runtime::new(
            store,
            RuntimeConfig::default(),
            BuiltinRegistry::new(),
            TranspilerRegistry::new(),
            evaluator,
            logger,
        );
        ModuleRuntime { inner }
    }

    /// `execute(opts)` (§6). `console` is optional: a plain object with
    /// `log`/`warn`/`error`/`clear` functions; when omitted the runtime
    /// buffers output itself and returns it as `stdout`.
    #[wasm_bindgen]
    pub fn execute(
        &self,
        project_id: String,
        project_name: String,
        file_path: String,
        argv: Vec<String>,
        log_fn: Option<Function>,
        warn_fn: Option<Function>,
        error_fn: Option<Function>,
        clear_fn: Option<Function>,
    ) -> Result<JsValue, JsValue> {
        let console = match (log_fn, warn_fn, error_fn, clear_fn) {
            (Some(log), Some(warn), Some(error), Some(clear)) => Some(JsConsole::new(log, warn, error, clear)),
            _ => None,
        };
        let mut opts = ExecuteOptions::new(project_id, project_name, file_path);
        opts.argv = argv;
        let console_ref = console.as_ref().map(|c| c as &dyn module_loader::ConsoleSink);
        opts.console = console_ref;

        let result = self.inner.execute(opts).map_err(WasmErr::from).map_err(JsValue::from)?;
        serde_wasm_bindgen::to_value(&ExecuteResultJs::from(result)).map_err(|err| JsValue::from_str(&err.to_string()))
    }

    /// `executeCode(code, opts)` (§6): stages `code` under the project as a
    /// temp file, then runs it through the same path as [`Self::execute`].
    #[wasm_bindgen(js_name = executeCode)]
    pub fn execute_code(
        &self,
        code: String,
        project_id: String,
        project_name: String,
        argv: Vec<String>,
        log_fn: Option<Function>,
        warn_fn: Option<Function>,
        error_fn: Option<Function>,
        clear_fn: Option<Function>,
    ) -> Result<JsValue, JsValue> {
        let console = match (log_fn, warn_fn, error_fn, clear_fn) {
            (Some(log), Some(warn), Some(error), Some(clear)) => Some(JsConsole::new(log, warn, error, clear)),
            _ => None,
        };
        let mut opts = ExecuteOptions::new(project_id, project_name, "/__executeCode/entry.js");
        opts.argv = argv;
        let console_ref = console.as_ref().map(|c| c as &dyn module_loader::ConsoleSink);
        opts.console = console_ref;

        let result = self.inner.execute_code(&code, opts).map_err(WasmErr::from).map_err(JsValue::from)?;
        serde_wasm_bindgen::to_value(&ExecuteResultJs::from(result)).map_err(|err| JsValue::from_str(&err.to_string()))
    }

    /// `clearCache()` (§6).
    #[wasm_bindgen(js_name = clearCache)]
    pub fn clear_cache(&self) {
        self.inner.clear_cache();
    }

    /// `dispose()` (§6).
    #[wasm_bindgen]
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    #[wasm_bindgen(js_name = projectCount)]
    pub fn project_count(&self) -> usize {
        self.inner.project_count()
    }
}

#[derive(serde::Serialize)]
struct ExecuteResultJs {
    stdout: Option<String>,
    stderr: Option<String>,
    #[serde(rename = "exitCode")]
    exit_code: Option<i32>,
}

impl From<module_runtime::ExecuteResult> for ExecuteResultJs {
    fn from(result: module_runtime::ExecuteResult) -> Self {
        Self { stdout: result.stdout, stderr: result.stderr, exit_code: result.exit_code }
    }
}
