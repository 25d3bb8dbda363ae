//! Local harness for exercising resolution, transpile-driving, caching, and
//! load ordering against a real directory tree, without a browser host.
//!
//! No JS engine is vendored (the sandbox escape stays a host concern, same
//! as the library crates): [`PrintEvaluator`] below just records which files
//! got run and in what order, so this binary proves out the graph-walking
//! half of the pipeline, not JS semantics.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use jwalk::WalkDir;
use module_loader::{BodyEvaluator, ConsoleLevel, ConsoleSink, EvalError, SandboxBindings};
use module_runtime::{ExecuteOptions, Runtime, RuntimeConfig};
use path_slash::PathExt;
use runtime_logger::StdioLogger;
use virtual_store::InMemoryFileStore;

const SOURCE_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx", "ts", "mts", "cts", "tsx", "json"];

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory to load as the project's virtual file tree.
    project_dir: String,
    /// Project-relative path (e.g. `/index.js`) to execute.
    #[arg(short, long, default_value = "/index.js")]
    entry: String,
    /// Run the parking_lot deadlock detector in the background.
    #[arg(short = 'D', long, default_value_t = false)]
    deadlock_detector: bool,
}

fn start_deadlock_detector() {
    use parking_lot::deadlock;
    use std::thread;
    use std::time::Duration;

    thread::spawn(move || loop {
        thread::sleep(Duration::from_secs(10));
        let deadlocks = deadlock::check_deadlock();
        if deadlocks.is_empty() {
            continue;
        }
        println!("{} deadlocks detected", deadlocks.len());
        for (i, threads) in deadlocks.iter().enumerate() {
            println!("Deadlock #{i}");
            for t in threads {
                println!("Thread Id {:#?}", t.thread_id());
            }
        }
    });
}

/// Records the order files are handed to `compile_and_run` in; never
/// actually interprets `code`.
#[derive(Clone, Default)]
struct PrintEvaluator {
    order: Arc<Mutex<Vec<String>>>,
}

impl BodyEvaluator for PrintEvaluator {
    fn compile_and_run(&self, _code: &str, bindings: SandboxBindings<'_>) -> Result<(), EvalError> {
        self.order.lock().unwrap().push(bindings.filename.clone());
        bindings.console.write(ConsoleLevel::Log, &format!("ran {}", bindings.filename));
        Ok(())
    }
}

fn load_tree_into_store(store: &InMemoryFileStore, project: &str, root: &Path) -> Result<()> {
    for entry in WalkDir::new(root) {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else { continue };
        if !SOURCE_EXTENSIONS.contains(&ext) {
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .with_context(|| format!("{} is not under {}", path.display(), root.display()))?;
        let app_path = format!("/{}", rel.to_slash_lossy());
        let content = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        store.put_file(project, &app_path, &content);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    if args.deadlock_detector {
        start_deadlock_detector();
    }

    let project_dir: PathBuf = PathBuf::from(&args.project_dir);
    let store = InMemoryFileStore::new();
    load_tree_into_store(&store, "cli", &project_dir)?;

    let runtime: Runtime<'_, Arc<StdioLogger>, PrintEvaluator> = Runtime::new(
        &store,
        RuntimeConfig::default(),
        builtin_registry::BuiltinRegistry::new(),
        transpiler_driver::TranspilerRegistry::new(),
        PrintEvaluator::default(),
        Arc::new(StdioLogger::new()),
    );

    let start = std::time::Instant::now();
    let result = runtime.execute(ExecuteOptions::new("cli", "cli", args.entry.as_str()))?;
    let elapsed = start.elapsed();

    println!("executed {} in {}ms", args.entry, elapsed.as_millis());
    if let Some(stdout) = &result.stdout {
        println!("stdout:\n{stdout}");
    }
    if let Some(stderr) = &result.stderr {
        println!("stderr:\n{stderr}");
    }
    println!("exit code: {:?}", result.exit_code);

    Ok(())
}
