//! Top-level orchestration (§6, §9.3): collects the tunables a project needs
//! (cache ceiling/watermark, transpile timeout, builtin/transpiler
//! registries) into one config, owns one [`module_loader::Loader`] per
//! project, and exposes the host-facing `execute`/`executeCode`/
//! `clearCache`/`dispose` surface. Mirrors the teacher's
//! `GoodFencesOptions` + top-level `good_fences(opts)` role of collecting
//! tunables into one options type passed into a runner.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use builtin_registry::BuiltinRegistry;
use dashmap::DashMap;
use module_loader::{BodyEvaluator, ConsoleSink, ExecContext, Loader, LoaderError, VecConsole};
use runtime_logger::Logger;
use transpiler_driver::TranspilerRegistry;
use virtual_store::FileStore;

const DEFAULT_CEILING_BYTES: u64 = 100 * 1024 * 1024;
const DEFAULT_LOW_WATERMARK: f64 = 0.7;
const DEFAULT_TRANSPILE_TIMEOUT: Duration = Duration::from_secs(10);

/// Constructed once per host session (§9.3); shared across every project the
/// host opens.
#[derive(Clone)]
pub struct RuntimeConfig {
    pub ceiling_bytes: u64,
    pub low_watermark: f64,
    pub transpile_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ceiling_bytes: DEFAULT_CEILING_BYTES,
            low_watermark: DEFAULT_LOW_WATERMARK,
            transpile_timeout: DEFAULT_TRANSPILE_TIMEOUT,
        }
    }
}

/// `execute(opts)` / `executeCode(code, opts)` input (§6).
pub struct ExecuteOptions<'a> {
    pub project_id: String,
    pub project_name: String,
    pub file_path: String,
    pub argv: Vec<String>,
    pub console: Option<&'a dyn ConsoleSink>,
    /// Accepted and forwarded opaquely: neither is part of the sandbox
    /// bindings contract (§4.7.4 binds exactly six names), so the core
    /// itself never reads terminal size or supplies input — both are the
    /// host's concern once it owns the process/stdin emulation.
    pub on_input: Option<Box<dyn Fn() -> Option<String> + 'a>>,
    pub terminal_size: Option<(u16, u16)>,
}

impl<'a> ExecuteOptions<'a> {
    pub fn new(project_id: impl Into<String>, project_name: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            project_name: project_name.into(),
            file_path: file_path.into(),
            argv: Vec::new(),
            console: None,
            on_input: None,
            terminal_size: None,
        }
    }
}

/// `execute`'s output/effect (§6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteResult {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit_code: Option<i32>,
}

/// Owns one [`Loader`] per `projectId` (§5: "callers must not share a loader
/// across projects"), lazily constructed on first `execute`.
pub struct Runtime<'s, L, E>
where
    L: Logger + 'static,
    E: BodyEvaluator + Clone + 'static,
{
    store: &'s dyn FileStore,
    config: RuntimeConfig,
    builtins: BuiltinRegistry,
    transpilers: TranspilerRegistry,
    evaluator: E,
    logger: L,
    loaders: DashMap<String, Arc<Loader<'s, L, E>>>,
    staged_code_counter: AtomicU64,
}

impl<'s, L, E> Runtime<'s, L, E>
where
    L: Logger + 'static,
    E: BodyEvaluator + Clone + 'static,
{
    pub fn new(
        store: &'s dyn FileStore,
        config: RuntimeConfig,
        builtins: BuiltinRegistry,
        transpilers: TranspilerRegistry,
        evaluator: E,
        logger: L,
    ) -> Self {
        Self {
            store,
            config,
            builtins,
            transpilers,
            evaluator,
            logger,
            loaders: DashMap::new(),
            staged_code_counter: AtomicU64::new(0),
        }
    }

    fn loader_for(&self, project_id: &str, project_name: &str) -> Arc<Loader<'s, L, E>> {
        if let Some(existing) = self.loaders.get(project_id) {
            return existing.clone();
        }
        let loader = Arc::new(Loader::with_cache_options(
            self.store,
            project_name,
            self.transpilers.clone(),
            self.builtins.clone(),
            self.evaluator.clone(),
            self.logger.clone(),
            self.config.ceiling_bytes,
            self.config.low_watermark,
            self.config.transpile_timeout,
        ));
        self.loaders.insert(project_id.to_string(), loader.clone());
        loader
    }

    /// `execute(opts)` (§6): evaluates `opts.filePath` and its transitive
    /// dependency graph against the project's loader, creating one on first
    /// use for `opts.projectId`.
    pub fn execute(&self, opts: ExecuteOptions<'_>) -> Result<ExecuteResult, LoaderError> {
        let loader = self.loader_for(&opts.project_id, &opts.project_name);
        let fallback_console = VecConsole::new();
        let console: &dyn ConsoleSink = opts.console.unwrap_or(&fallback_console);
        let ctx = ExecContext { console, env: Default::default(), argv: opts.argv };

        let outcome = loader.execute(&opts.file_path, &ctx);
        let (stdout, exit_code) = match &outcome {
            Ok(_) => (Some(render_console(&fallback_console, opts.console)), Some(0)),
            Err(_) => (None, Some(1)),
        };
        match outcome {
            Ok(_) => Ok(ExecuteResult { stdout, stderr: None, exit_code }),
            Err(err) => Ok(ExecuteResult { stdout, stderr: Some(err.to_string()), exit_code }),
        }
    }

    /// `executeCode(code, opts)` (§6): stages `code` as a temp file under the
    /// project, then delegates to [`Self::execute`] with `filePath`
    /// rewritten to that staged path.
    pub fn execute_code(&self, code: &str, mut opts: ExecuteOptions<'_>) -> Result<ExecuteResult, LoaderError> {
        let n = self.staged_code_counter.fetch_add(1, Ordering::Relaxed);
        let staged_path = format!("/__executeCode/{n}.js");
        self.store
            .save(&opts.project_name, &staged_path, code.to_string())
            .map_err(|source| LoaderError::Store { path: staged_path.clone(), source: source.into() })?;
        opts.file_path = staged_path;
        self.execute(opts)
    }

    /// `clearCache()` (§6): clears every project's artifact cache and
    /// execution cache.
    pub fn clear_cache(&self) {
        for entry in self.loaders.iter() {
            entry.value().clear_cache();
        }
    }

    /// `dispose()` (§6): releases every project's loader (dropping the
    /// transpile worker threads they might still be holding onto) and
    /// clears caches first so nothing partially-loaded is observable after
    /// disposal.
    pub fn dispose(&self) {
        self.clear_cache();
        self.loaders.clear();
    }

    pub fn project_count(&self) -> usize {
        self.loaders.len()
    }
}

/// Renders a [`VecConsole`] fallback's buffered lines into one string; when
/// the host supplied its own `console`, we have no buffer to read from and
/// return an empty string (the host already owns its own output surface).
fn render_console(fallback: &VecConsole, host_console: Option<&dyn ConsoleSink>) -> String {
    if host_console.is_some() {
        return String::new();
    }
    fallback
        .lines()
        .into_iter()
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
}
