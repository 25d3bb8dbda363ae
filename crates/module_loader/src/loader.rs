use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use artifact_cache::ArtifactCache;
use builtin_registry::{BuiltinModule, BuiltinRegistry};
use module_resolver::{classify, is_builtin, Resolver, Specifier};
use runtime_logger::Logger;
use transpiler_driver::{TranspilerDriver, TranspilerRegistry};
use virtual_store::FileStore;

use crate::error::LoaderError;
use crate::exec_cache::{ExecutionCache, Probe};
use crate::sandbox::{BodyEvaluator, ConsoleSink, ExportsCell, RequireOutcome, SandboxBindings};
use crate::wrap::{wrap_entry_body, wrap_module_body};

/// Extensions (and the empty suffix, for an already-extensioned candidate)
/// tried by a synchronous `require` at evaluation time (§4.7.5). Narrower
/// than the resolver's own extension-probe table because this path never
/// touches the file store — it only probes the execution cache.
const SYNC_REQUIRE_SUFFIXES: &[&str] = &["", ".js", ".mjs", ".ts", ".mts", ".tsx", ".jsx"];
const SYNC_REQUIRE_INDEX_SUFFIXES: &[&str] = &["/index.js", "/index.ts"];

/// Per-call context that doesn't belong in the loader's own lifetime: the
/// console sink, emulated `process.env`, and `argv`, all handed to the host
/// evaluator as sandbox bindings (§4.7.3).
pub struct ExecContext<'a> {
    pub console: &'a dyn ConsoleSink,
    pub env: std::collections::HashMap<String, String>,
    pub argv: Vec<String>,
}

impl<'a> ExecContext<'a> {
    pub fn new(console: &'a dyn ConsoleSink) -> Self {
        Self { console, env: std::collections::HashMap::new(), argv: Vec::new() }
    }
}

/// Orchestrates resolve -> read -> transpile (via cache) -> recurse into
/// dependencies -> evaluate (§4.7), owning the resolver, artifact cache, and
/// execution cache for exactly one project (§5: never shared across
/// projects).
pub struct Loader<'s, L: Logger, E: BodyEvaluator> {
    store: &'s dyn FileStore,
    project: String,
    resolver: Resolver<'s, L>,
    cache: ArtifactCache<'s, L>,
    driver: TranspilerDriver<L>,
    exec: ExecutionCache,
    builtins: BuiltinRegistry,
    evaluator: E,
    logger: L,
    cache_initialized: AtomicBool,
}

impl<'s, L: Logger, E: BodyEvaluator> Loader<'s, L, E> {
    pub fn new(
        store: &'s dyn FileStore,
        project: impl Into<String>,
        registry: TranspilerRegistry,
        builtins: BuiltinRegistry,
        evaluator: E,
        logger: L,
    ) -> Self {
        let project = project.into();
        Self {
            store,
            project: project.clone(),
            resolver: Resolver::new(store, project.clone(), logger.clone()),
            cache: ArtifactCache::new(store, project.clone(), logger.clone()),
            driver: TranspilerDriver::new(registry, logger.clone()),
            exec: ExecutionCache::new(),
            builtins,
            evaluator,
            logger,
            cache_initialized: AtomicBool::new(false),
        }
    }

    /// Like [`Self::new`] but with the artifact cache's ceiling/low-watermark
    /// and the transpile timeout taken from a host-supplied configuration
    /// (§9.3) instead of the built-in defaults.
    #[allow(clippy::too_many_arguments)]
    pub fn with_cache_options(
        store: &'s dyn FileStore,
        project: impl Into<String>,
        registry: TranspilerRegistry,
        builtins: BuiltinRegistry,
        evaluator: E,
        logger: L,
        ceiling_bytes: u64,
        low_watermark: f64,
        transpile_timeout: Duration,
    ) -> Self {
        let project = project.into();
        Self {
            store,
            project: project.clone(),
            resolver: Resolver::new(store, project.clone(), logger.clone()),
            cache: ArtifactCache::with_ceiling(store, project.clone(), ceiling_bytes, low_watermark, logger.clone()),
            driver: TranspilerDriver::with_timeout(registry, transpile_timeout, logger.clone()),
            exec: ExecutionCache::new(),
            builtins,
            evaluator,
            logger,
            cache_initialized: AtomicBool::new(false),
        }
    }

    /// `clearCache()` (§6): drops both the artifact cache's in-memory map
    /// and the execution cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
        self.exec.clear();
    }

    pub fn artifact_cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn execution_cache_len(&self) -> usize {
        self.exec.len()
    }

    fn ensure_cache_initialized(&self) -> Result<(), LoaderError> {
        if self.cache_initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.cache
            .load_from_store()
            .map_err(|source| LoaderError::Store { path: "<artifact cache>".to_string(), source })
    }

    /// `execute(filePath)` (§4.7 top-level entry).
    pub fn execute(&self, file_path: &str, ctx: &ExecContext<'_>) -> Result<ExportsCell, LoaderError> {
        self.ensure_cache_initialized()?;

        match self.exec.probe(file_path) {
            Probe::Loaded(cell) => return Ok(cell),
            Probe::Loading(cell) => return Ok(cell),
            Probe::Missing => {}
        }

        let drive = self.read_and_transpile(file_path)?;
        let cell = self.exec.begin_loading(file_path);
        self.preload_deps(&drive.deps, file_path, ctx);

        let wrapped = wrap_entry_body(&drive.code);
        match self.run_wrapped(file_path, &wrapped, cell.clone(), ctx) {
            Ok(()) => {
                self.exec.mark_loaded(file_path);
                Ok(cell)
            }
            Err(err) => {
                self.exec.abandon(file_path);
                Err(err)
            }
        }
    }

    /// `load(spec, fromFile) -> exports` (§4.7 recursive loading).
    pub fn load(&self, spec: &str, from_file: &str, ctx: &ExecContext<'_>) -> Result<RequireOutcome, LoaderError> {
        let resolution = self
            .resolver
            .resolve(spec, from_file)
            .map_err(|source| LoaderError::Resolve { specifier: spec.to_string(), from: from_file.to_string(), source })?;
        let Some(resolution) = resolution else {
            return Err(LoaderError::CannotFindModule { specifier: spec.to_string(), from: from_file.to_string() });
        };

        if resolution.is_builtin {
            return Ok(RequireOutcome::Builtin(self.builtin_module(&resolution.path)));
        }

        let path = resolution.path;
        match self.exec.probe(&path) {
            Probe::Loaded(cell) | Probe::Loading(cell) => return Ok(RequireOutcome::Module(cell)),
            Probe::Missing => {}
        }

        let drive = self.read_and_transpile(&path)?;
        let cell = self.exec.begin_loading(&path);
        self.preload_deps(&drive.deps, &path, ctx);

        let wrapped = wrap_module_body(&drive.code);
        match self.run_wrapped(&path, &wrapped, cell.clone(), ctx) {
            Ok(()) => {
                self.exec.mark_loaded(&path);
                if matches!(classify(spec), Specifier::Package { .. }) {
                    self.exec.record_bare_name(spec, &path);
                }
                Ok(RequireOutcome::Module(cell))
            }
            Err(err) => {
                self.exec.abandon(&path);
                Err(err)
            }
        }
    }

    fn builtin_module(&self, name: &str) -> BuiltinModule {
        self.builtins.get(name).cloned().unwrap_or_else(|| BuiltinModule::new(serde_json::Value::Null))
    }

    fn read_and_transpile(&self, path: &str) -> Result<transpiler_driver::DriveResult, LoaderError> {
        let file = self
            .store
            .read(&self.project, path)
            .map_err(|source| LoaderError::Store { path: path.to_string(), source: source.into() })?
            .ok_or_else(|| LoaderError::FileNotFound { path: path.to_string() })?;
        if file.is_binary {
            return Err(LoaderError::BinaryNotExecutable { path: path.to_string() });
        }
        let source = file.content.unwrap_or_default();
        Ok(self.driver.drive(&self.cache, path, &source, 0)?)
    }

    /// §4.7 step 5: depth-first, in normalized-code appearance order;
    /// individual failures are logged and swallowed because a `require`
    /// call the actual body never reaches (a guarded/dynamic one) should not
    /// fail the whole load.
    fn preload_deps(&self, deps: &[String], from_path: &str, ctx: &ExecContext<'_>) {
        for dep in deps {
            if is_builtin(dep) {
                continue;
            }
            if let Err(err) = self.load(dep, from_path, ctx) {
                self.logger.warn(format!("pre-load of '{dep}' from {from_path} failed: {err}"));
            }
        }
    }

    fn run_wrapped(
        &self,
        path: &str,
        wrapped: &str,
        cell: ExportsCell,
        ctx: &ExecContext<'_>,
    ) -> Result<(), LoaderError> {
        let dirname = path_algebra::dirname(path);
        let from_file = path.to_string();
        let require = move |spec: &str| -> Result<RequireOutcome, anyhow::Error> {
            self.find_preloaded(spec, &from_file).map_err(anyhow::Error::new)
        };

        let bindings = SandboxBindings {
            filename: path.to_string(),
            dirname,
            module_exports: cell,
            require: Box::new(require),
            console: ctx.console,
            env: ctx.env.clone(),
            argv: ctx.argv.clone(),
        };

        self.evaluator
            .compile_and_run(wrapped, bindings)
            .map_err(|err| LoaderError::Eval { path: path.to_string(), source: anyhow::anyhow!(err.0) })
    }

    /// §4.7.5: the synchronous `require` lookup. Never touches the file
    /// store; only probes the execution cache that pre-loading already
    /// populated.
    fn find_preloaded(&self, spec: &str, from_file: &str) -> Result<RequireOutcome, LoaderError> {
        match classify(spec) {
            Specifier::Builtin(name) => Ok(RequireOutcome::Builtin(self.builtin_module(name))),
            Specifier::Relative(rel) => {
                let base = path_algebra::dirname(from_file);
                let candidate = path_algebra::resolve_relative(&base, rel);
                self.probe_candidates(&candidate, spec, from_file)
            }
            Specifier::Alias(rest) => {
                let candidate = path_algebra::join(&["/src", rest]);
                self.probe_candidates(&candidate, spec, from_file)
            }
            Specifier::Absolute(abs) => self.probe_candidates(abs, spec, from_file),
            // Subpath imports (`#…`) are resolved against `package.json`
            // during pre-load (§4.3 step 2) but, per §4.7.5, the bare-name
            // map records only package specifiers — there is no store-free
            // way to redo that resolution here, so a direct synchronous
            // `require('#…')` call that wasn't already satisfied by a
            // cache hit on its own text is `NotPreloaded`.
            Specifier::SubpathImport(_) => {
                Err(LoaderError::NotPreloaded { specifier: spec.to_string(), from: from_file.to_string() })
            }
            Specifier::Package { .. } => {
                if let Some(path) = self.exec.resolved_bare_name(spec) {
                    return self.probe_candidates(&path, spec, from_file);
                }
                let Specifier::Package { name, subpath } = classify(spec) else { unreachable!() };
                let tail = if subpath.is_empty() { "index.js".to_string() } else { subpath };
                let candidate = path_algebra::join(&["/node_modules", &name, &tail]);
                self.probe_candidates(&candidate, spec, from_file)
            }
        }
    }

    fn probe_candidates(&self, candidate: &str, spec: &str, from_file: &str) -> Result<RequireOutcome, LoaderError> {
        for suffix in SYNC_REQUIRE_SUFFIXES {
            if let Some(outcome) = self.probe_exact(&format!("{candidate}{suffix}")) {
                return Ok(outcome);
            }
        }
        for suffix in SYNC_REQUIRE_INDEX_SUFFIXES {
            if let Some(outcome) = self.probe_exact(&format!("{candidate}{suffix}")) {
                return Ok(outcome);
            }
        }
        Err(LoaderError::NotPreloaded { specifier: spec.to_string(), from: from_file.to_string() })
    }

    fn probe_exact(&self, path: &str) -> Option<RequireOutcome> {
        match self.exec.probe(path) {
            Probe::Loaded(cell) | Probe::Loading(cell) => Some(RequireOutcome::Module(cell)),
            Probe::Missing => None,
        }
    }
}
