use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use artifact_cache::{ArtifactCache, SetEntry};
use runtime_logger::Logger;

use crate::hash::content_hash;
use crate::registry::TranspilerRegistry;
use crate::transpiler::{TranspileError, TranspileOptions};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// `.ts`/`.tsx`/`.mts`/`.cts`/`.jsx` always need the full transpiler
/// capability; everything else only needs it if it looks like ESM/CJS.
fn needs_full_transpile(ext: &str) -> bool {
    matches!(ext, "ts" | "tsx" | "mts" | "cts" | "jsx")
}

fn is_typescript_ext(ext: &str) -> bool {
    matches!(ext, "ts" | "tsx" | "mts" | "cts")
}

fn is_jsx_ext(ext: &str) -> bool {
    matches!(ext, "tsx" | "jsx")
}

#[derive(Debug, Clone)]
pub struct DriveResult {
    pub code: String,
    pub deps: Vec<String>,
}

/// Orchestrates §4.5: hash -> cache lookup -> decide -> delegate (to the
/// registered transpiler capability or the normalizer) -> persist.
pub struct TranspilerDriver<L: Logger> {
    registry: TranspilerRegistry,
    timeout: Duration,
    logger: L,
}

impl<L: Logger> TranspilerDriver<L> {
    pub fn new(registry: TranspilerRegistry, logger: L) -> Self {
        Self::with_timeout(registry, DEFAULT_TIMEOUT, logger)
    }

    pub fn with_timeout(registry: TranspilerRegistry, timeout: Duration, logger: L) -> Self {
        Self { registry, timeout, logger }
    }

    pub fn drive<CL: Logger>(
        &self,
        cache: &ArtifactCache<'_, CL>,
        app_path: &str,
        source: &str,
        mtime: u64,
    ) -> Result<DriveResult, TranspileError> {
        let hash = content_hash(source);

        match cache.get(app_path, Some(&hash)) {
            Ok(Some(entry)) => return Ok(DriveResult { code: entry.code, deps: entry.meta.deps }),
            Ok(None) => {}
            Err(err) => self.logger.warn(format!("artifact cache read failed for {app_path}: {err:#}")),
        }

        let ext = path_algebra::extname(app_path);
        let ext = ext.trim_start_matches('.');

        let (code, deps) = if needs_full_transpile(ext) {
            let transpiler = self.registry.get(ext).ok_or_else(|| TranspileError::Failed {
                path: app_path.to_string(),
                reason: format!("no transpiler registered for .{ext}"),
            })?;
            let opts = TranspileOptions {
                file_path: app_path.to_string(),
                is_typescript: is_typescript_ext(ext),
                is_es_module: true,
                is_jsx: is_jsx_ext(ext),
            };
            let out = self.transpile_with_timeout(transpiler, source.to_string(), opts, app_path.to_string())?;
            (out.code, out.dependencies.unwrap_or_default())
        } else if js_normalizer::looks_like_module_or_commonjs(source) {
            let normalized = js_normalizer::normalize(source);
            (normalized.code, normalized.dependencies)
        } else {
            (source.to_string(), Vec::new())
        };

        if let Err(err) = cache.set(SetEntry {
            original_path: app_path.to_string(),
            content_hash: hash,
            code: code.clone(),
            source_map: None,
            deps: deps.clone(),
            mtime,
        }) {
            self.logger.warn(format!("artifact cache write failed for {app_path}: {err:#}"));
        }

        Ok(DriveResult { code, deps })
    }

    /// Runs the transpiler capability on a worker thread so the driver's
    /// timeout (default 10s) can be enforced even though the capability is
    /// an opaque external call. On timeout the worker is abandoned (its
    /// result, if it ever arrives, is simply dropped).
    fn transpile_with_timeout(
        &self,
        transpiler: std::sync::Arc<dyn crate::transpiler::Transpiler>,
        code: String,
        opts: TranspileOptions,
        path: String,
    ) -> Result<crate::transpiler::TranspileOutput, TranspileError> {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = transpiler.transpile(&code, opts);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(_) => Err(TranspileError::Timeout { path, timeout_secs: self.timeout.as_secs() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::{Transpiler, TranspileOutput};
    use pretty_assertions::assert_eq;
    use runtime_logger::VecLogger;
    use std::sync::Arc;
    use virtual_store::InMemoryFileStore;

    struct UppercaseTs;
    impl Transpiler for UppercaseTs {
        fn extensions(&self) -> &[&str] {
            &["ts"]
        }
        fn transpile(&self, code: &str, _opts: TranspileOptions) -> Result<TranspileOutput, TranspileError> {
            Ok(TranspileOutput { code: code.to_uppercase(), map: None, dependencies: Some(vec![]) })
        }
    }

    struct SlowTranspiler;
    impl Transpiler for SlowTranspiler {
        fn extensions(&self) -> &[&str] {
            &["ts"]
        }
        fn transpile(&self, _code: &str, _opts: TranspileOptions) -> Result<TranspileOutput, TranspileError> {
            thread::sleep(Duration::from_millis(50));
            Ok(TranspileOutput { code: String::new(), map: None, dependencies: None })
        }
    }

    fn logger() -> &'static VecLogger {
        Box::leak(Box::new(VecLogger::new()))
    }

    #[test]
    fn plain_js_without_module_syntax_passes_through_unchanged() {
        let store = InMemoryFileStore::new();
        let cache = ArtifactCache::new(&store, "p", logger());
        let driver = TranspilerDriver::new(TranspilerRegistry::new(), logger());
        let result = driver.drive(&cache, "/a.js", "console.log(1);", 0).unwrap();
        assert_eq!(result.code, "console.log(1);");
        assert!(result.deps.is_empty());
    }

    #[test]
    fn plain_js_with_require_goes_through_normalizer() {
        let store = InMemoryFileStore::new();
        let cache = ArtifactCache::new(&store, "p", logger());
        let driver = TranspilerDriver::new(TranspilerRegistry::new(), logger());
        let result = driver.drive(&cache, "/a.js", "const x = require('y');", 0).unwrap();
        assert_eq!(result.deps, vec!["y".to_string()]);
    }

    #[test]
    fn typescript_dispatches_to_registered_transpiler() {
        let store = InMemoryFileStore::new();
        let cache = ArtifactCache::new(&store, "p", logger());
        let mut registry = TranspilerRegistry::new();
        registry.register(Arc::new(UppercaseTs));
        let driver = TranspilerDriver::new(registry, logger());
        let result = driver.drive(&cache, "/a.ts", "const x: number = 1;", 0).unwrap();
        assert_eq!(result.code, "CONST X: NUMBER = 1;");
    }

    #[test]
    fn typescript_without_registered_transpiler_fails() {
        let store = InMemoryFileStore::new();
        let cache = ArtifactCache::new(&store, "p", logger());
        let driver = TranspilerDriver::new(TranspilerRegistry::new(), logger());
        let err = driver.drive(&cache, "/a.ts", "const x = 1;", 0).unwrap_err();
        assert!(matches!(err, TranspileError::Failed { .. }));
    }

    #[test]
    fn cache_hit_skips_retranspilation() {
        let store = InMemoryFileStore::new();
        let cache = ArtifactCache::new(&store, "p", logger());
        let mut registry = TranspilerRegistry::new();
        registry.register(Arc::new(UppercaseTs));
        let driver = TranspilerDriver::new(registry, logger());

        let first = driver.drive(&cache, "/a.ts", "const x = 1;", 0).unwrap();
        assert_eq!(first.code, "CONST X = 1;");
        assert_eq!(cache.len(), 1);

        let second = driver.drive(&cache, "/a.ts", "const x = 1;", 0).unwrap();
        assert_eq!(second.code, "CONST X = 1;");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn slow_transpiler_times_out() {
        let store = InMemoryFileStore::new();
        let cache = ArtifactCache::new(&store, "p", logger());
        let mut registry = TranspilerRegistry::new();
        registry.register(Arc::new(SlowTranspiler));
        let driver = TranspilerDriver::with_timeout(registry, Duration::from_millis(1), logger());
        let err = driver.drive(&cache, "/a.ts", "const x = 1;", 0).unwrap_err();
        assert!(matches!(err, TranspileError::Timeout { .. }));
    }
}
