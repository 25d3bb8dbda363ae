//! Component G (§4.7): dependency-graph-ordered loading and evaluation over
//! the resolver, artifact cache, and transpiler driver, cycle-safe via a
//! shared exports cell and a host-discharged [`sandbox::BodyEvaluator`].

pub mod error;
pub mod exec_cache;
pub mod loader;
pub mod sandbox;
pub mod wrap;

pub use error::LoaderError;
pub use exec_cache::{ExecCacheEntry, ExecutionCache, Probe};
pub use loader::{ExecContext, Loader};
pub use sandbox::{
    new_exports_cell, BodyEvaluator, ConsoleLevel, ConsoleSink, EvalError, ExportsCell,
    RequireOutcome, SandboxBindings, VecConsole,
};
pub use wrap::{wrap_entry_body, wrap_module_body};

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use builtin_registry::{BuiltinModule, BuiltinRegistry};
    use runtime_logger::VecLogger;
    use serde_json::json;
    use transpiler_driver::TranspilerRegistry;
    use virtual_store::InMemoryFileStore;

    use super::*;

    fn logger() -> &'static VecLogger {
        Box::leak(Box::new(VecLogger::new()))
    }

    /// A fake evaluator that understands a tiny scripted subset of bodies,
    /// enough to exercise `module.exports = {...}` and a `require(...)`
    /// call, without needing an actual JS engine.
    struct ScriptedEvaluator {
        /// path -> value to assign to `module.exports`
        exports: HashMap<String, serde_json::Value>,
        /// path -> specifier to `require` and stash under `"dep"`
        requires: HashMap<String, String>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedEvaluator {
        fn new() -> Self {
            Self { exports: HashMap::new(), requires: HashMap::new(), calls: RefCell::new(Vec::new()) }
        }
    }

    impl BodyEvaluator for ScriptedEvaluator {
        fn compile_and_run(&self, _code: &str, bindings: SandboxBindings<'_>) -> Result<(), EvalError> {
            self.calls.borrow_mut().push(bindings.filename.clone());
            if let Some(spec) = self.requires.get(&bindings.filename) {
                match (bindings.require)(spec) {
                    Ok(RequireOutcome::Module(cell)) => {
                        let dep_val = cell.read().clone();
                        let mut exports = bindings.module_exports.write();
                        exports["dep"] = dep_val;
                    }
                    Ok(RequireOutcome::Builtin(module)) => {
                        let mut exports = bindings.module_exports.write();
                        exports["dep"] = module.0.clone();
                    }
                    Err(err) => return Err(EvalError(err.to_string())),
                }
            }
            if let Some(value) = self.exports.get(&bindings.filename) {
                let mut exports = bindings.module_exports.write();
                for (k, v) in value.as_object().unwrap() {
                    exports[k] = v.clone();
                }
            }
            Ok(())
        }
    }

    fn console() -> VecConsole {
        VecConsole::new()
    }

    #[test]
    fn executes_entry_with_no_dependencies() {
        let store = InMemoryFileStore::new();
        store.put_file("p", "/index.js", "module.exports = { ok: true };");

        let mut evaluator = ScriptedEvaluator::new();
        evaluator.exports.insert("/index.js".to_string(), json!({"ok": true}));

        let loader = Loader::new(
            &store,
            "p",
            TranspilerRegistry::new(),
            BuiltinRegistry::new(),
            evaluator,
            logger(),
        );
        let console = console();
        let ctx = ExecContext::new(&console);
        let exports = loader.execute("/index.js", &ctx).expect("execute");
        assert_eq!(*exports.read(), json!({"ok": true}));
    }

    #[test]
    fn preloads_a_relative_dependency_before_evaluating_the_entry() {
        let store = InMemoryFileStore::new();
        store.put_file("p", "/util.js", "module.exports = { value: 42 };");
        store.put_file("p", "/index.js", "const u = require('./util.js');\nmodule.exports = u;");

        let mut evaluator = ScriptedEvaluator::new();
        evaluator.exports.insert("/util.js".to_string(), json!({"value": 42}));
        evaluator.requires.insert("/index.js".to_string(), "./util.js".to_string());

        let loader = Loader::new(
            &store,
            "p",
            TranspilerRegistry::new(),
            BuiltinRegistry::new(),
            evaluator,
            logger(),
        );
        let console = console();
        let ctx = ExecContext::new(&console);
        let exports = loader.execute("/index.js", &ctx).expect("execute");
        assert_eq!(*exports.read(), json!({"dep": {"value": 42}}));
    }

    #[test]
    fn builtin_dependency_resolves_without_touching_the_store() {
        let store = InMemoryFileStore::new();
        store.put_file("p", "/index.js", "const p = require('path');\nmodule.exports = p;");

        let mut evaluator = ScriptedEvaluator::new();
        evaluator.requires.insert("/index.js".to_string(), "path".to_string());

        let mut builtins = BuiltinRegistry::new();
        builtins.register("path", BuiltinModule::new(json!({"sep": "/"})));

        let loader = Loader::new(
            &store,
            "p",
            TranspilerRegistry::new(),
            builtins,
            evaluator,
            logger(),
        );
        let console = console();
        let ctx = ExecContext::new(&console);
        let exports = loader.execute("/index.js", &ctx).expect("execute");
        assert_eq!(*exports.read(), json!({"dep": {"sep": "/"}}));
    }

    #[test]
    fn missing_entry_file_fails_with_file_not_found() {
        let store = InMemoryFileStore::new();
        let loader = Loader::new(
            &store,
            "p",
            TranspilerRegistry::new(),
            BuiltinRegistry::new(),
            ScriptedEvaluator::new(),
            logger(),
        );
        let console = console();
        let ctx = ExecContext::new(&console);
        let err = loader.execute("/missing.js", &ctx).unwrap_err();
        assert!(matches!(err, LoaderError::FileNotFound { .. }));
    }

    #[test]
    fn synchronous_require_of_an_unloaded_module_fails_not_preloaded() {
        let store = InMemoryFileStore::new();
        store.put_file("p", "/other.js", "module.exports = {};");
        store.put_file("p", "/index.js", "module.exports = require('./other.js');");

        // No dependency extraction for this fake body (the normalizer is
        // never invoked on plain CJS with no import/export syntax), so the
        // loader never pre-loads `/other.js`; the scripted evaluator calls
        // `require` directly to simulate a `require` the dependency scanner
        // missed.
        struct DirectRequireEvaluator;
        impl BodyEvaluator for DirectRequireEvaluator {
            fn compile_and_run(&self, _code: &str, bindings: SandboxBindings<'_>) -> Result<(), EvalError> {
                (bindings.require)("./other.js").map_err(|e| EvalError(e.to_string()))?;
                Ok(())
            }
        }

        let loader = Loader::new(
            &store,
            "p",
            TranspilerRegistry::new(),
            BuiltinRegistry::new(),
            DirectRequireEvaluator,
            logger(),
        );
        let console = console();
        let ctx = ExecContext::new(&console);
        let err = loader.execute("/index.js", &ctx).unwrap_err();
        assert!(matches!(err, LoaderError::Eval { .. }));
    }

    /// Scenario: a requires b, b requires a back (a relative CommonJS
    /// cycle). Because pre-loading (§4.7 step 5) fully resolves and
    /// evaluates every dependency of a module before that module's own body
    /// ever runs, the nested participant (`b`) observes `a`'s cell in its
    /// pre-body state, not mid-body — only a *later* module's completed
    /// writes are visible to an *earlier* one, matching §9's design note
    /// ("completion of the later body is visible to the earlier") rather
    /// than JS's inline require-interleaved-with-statements order. The
    /// property this test holds the loader to is the one §5/§8 actually
    /// guarantee: the cycle resolves without looping forever and each
    /// module's own writes land in its own exports.
    #[test]
    fn commonjs_relative_cycle_resolves_without_looping() {
        let store = InMemoryFileStore::new();
        store.put_file("p", "/a.js", "exports.a = 1;\nconst b = require('./b.js');\nexports.a2 = b.b;");
        store.put_file("p", "/b.js", "exports.b = 2;\nconst a = require('./a.js');\nexports.aBack = a.a;");

        struct CycleEvaluator;
        impl BodyEvaluator for CycleEvaluator {
            fn compile_and_run(&self, _code: &str, bindings: SandboxBindings<'_>) -> Result<(), EvalError> {
                match bindings.filename.as_str() {
                    "/a.js" => {
                        bindings.module_exports.write()["a"] = json!(1);
                        let b = (bindings.require)("./b.js").map_err(|e| EvalError(e.to_string()))?;
                        let RequireOutcome::Module(b_cell) = b else { panic!("expected module") };
                        let b_val = b_cell.read().get("b").cloned().unwrap_or(json!(null));
                        bindings.module_exports.write()["a2"] = b_val;
                    }
                    "/b.js" => {
                        bindings.module_exports.write()["b"] = json!(2);
                        let a = (bindings.require)("./a.js").map_err(|e| EvalError(e.to_string()))?;
                        let RequireOutcome::Module(a_cell) = a else { panic!("expected module") };
                        let a_val = a_cell.read().get("a").cloned().unwrap_or(json!(null));
                        bindings.module_exports.write()["aBack"] = a_val;
                    }
                    other => panic!("unexpected module {other}"),
                }
                Ok(())
            }
        }

        let loader = Loader::new(
            &store,
            "p",
            TranspilerRegistry::new(),
            BuiltinRegistry::new(),
            CycleEvaluator,
            logger(),
        );
        let console = console();
        let ctx = ExecContext::new(&console);
        let a_exports = loader.execute("/a.js", &ctx).expect("cycle must resolve, not loop");

        assert_eq!(a_exports.read()["a"], json!(1));
        assert_eq!(a_exports.read()["a2"], json!(2), "a sees b's completed exports once b has finished loading");

        let b_exports = loader.execution_cache_len();
        assert_eq!(b_exports, 2, "both a.js and b.js end up in the execution cache");
    }

    #[test]
    fn clear_cache_empties_both_caches() {
        let store = InMemoryFileStore::new();
        store.put_file("p", "/index.js", "module.exports = {};");
        let mut evaluator = ScriptedEvaluator::new();
        evaluator.exports.insert("/index.js".to_string(), json!({}));

        let loader = Loader::new(
            &store,
            "p",
            TranspilerRegistry::new(),
            BuiltinRegistry::new(),
            evaluator,
            logger(),
        );
        let console = console();
        let ctx = ExecContext::new(&console);
        loader.execute("/index.js", &ctx).expect("execute");
        assert_eq!(loader.execution_cache_len(), 1);
        loader.clear_cache();
        assert_eq!(loader.execution_cache_len(), 0);
    }
}
