use std::sync::Arc;

use packagejson::PackageJson;
use packagejson_exports::PackageExportRewriteData;
use path_algebra::{dirname, join};
use runtime_logger::Logger;
use virtual_store::FileStore;

use crate::cache::ResolverCache;
use crate::specifier::{classify, Specifier};

/// Extensions tried, in order, when a candidate path has none of its own.
const PROBE_EXTENSIONS: &[&str] = &[".js", ".mjs", ".ts", ".mts", ".tsx", ".jsx", ".json"];
/// `index.*` candidates tried when a directory import is suspected.
const PROBE_INDEX_NAMES: &[&str] =
    &["index.js", "index.mjs", "index.ts", "index.mts", "index.tsx"];
/// Extensions a candidate may already end with and be accepted verbatim.
const KNOWN_EXTENSIONS: &[&str] =
    &[".js", ".mjs", ".cjs", ".ts", ".mts", ".cts", ".tsx", ".jsx", ".json"];
/// Export/import condition preference: `import`, then `require`, then the
/// implicit `default` fallback `rewrite_relative_export` always tries last.
const EXPORT_CONDITIONS: [&str; 2] = ["import", "require"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    pub path: String,
    pub is_builtin: bool,
    pub is_node_module: bool,
}

/// Deterministic specifier resolution over a project's virtual tree.
/// Memoizes `package.json` parses and existence probes for the life of the
/// instance; one resolver is owned per project (never shared across
/// projects, mirroring the loader's single-project ownership in §5).
pub struct Resolver<'s, L: Logger> {
    store: &'s dyn FileStore,
    project: String,
    cache: ResolverCache,
    logger: L,
}

impl<'s, L: Logger> Resolver<'s, L> {
    pub fn new(store: &'s dyn FileStore, project: impl Into<String>, logger: L) -> Self {
        Self { store, project: project.into(), cache: ResolverCache::new(), logger }
    }

    pub fn resolve(&self, spec: &str, from_file: &str) -> anyhow::Result<Option<ResolutionResult>> {
        match classify(spec) {
            Specifier::Builtin(name) => Ok(Some(ResolutionResult {
                path: name.to_string(),
                is_builtin: true,
                is_node_module: false,
            })),
            Specifier::SubpathImport(rest) => self.resolve_subpath_import(rest, from_file),
            Specifier::Relative(rel) => {
                let base = dirname(from_file);
                let candidate = path_algebra::resolve_relative(&base, rel);
                Ok(self.extension_probe(&candidate)?.map(|path| ResolutionResult {
                    path,
                    is_builtin: false,
                    is_node_module: false,
                }))
            }
            Specifier::Alias(rest) => {
                let candidate = join(&["/src", rest]);
                Ok(self.extension_probe(&candidate)?.map(|path| ResolutionResult {
                    path,
                    is_builtin: false,
                    is_node_module: false,
                }))
            }
            Specifier::Absolute(abs) => Ok(self.extension_probe(abs)?.map(|path| ResolutionResult {
                path,
                is_builtin: false,
                is_node_module: false,
            })),
            Specifier::Package { name, subpath } => self.resolve_package(&name, &subpath),
        }
    }

    /// §4.3.2: probes a candidate path for existence, trying known source
    /// extensions and then `index.*` files inside it as a directory.
    fn extension_probe(&self, candidate: &str) -> anyhow::Result<Option<String>> {
        if KNOWN_EXTENSIONS.iter().any(|ext| candidate.ends_with(*ext))
            && self.cache.file_exists(self.store, &self.project, candidate)?
        {
            return Ok(Some(candidate.to_string()));
        }

        for ext in PROBE_EXTENSIONS {
            let with_ext = format!("{candidate}{ext}");
            if self.cache.file_exists(self.store, &self.project, &with_ext)? {
                return Ok(Some(with_ext));
            }
        }

        for &index_name in PROBE_INDEX_NAMES {
            let with_index = join(&[candidate, index_name]);
            if self.cache.file_exists(self.store, &self.project, &with_index)? {
                return Ok(Some(with_index));
            }
        }

        Ok(None)
    }

    /// §4.3 step 2: walks from `dirname(from_file)` up toward the project
    /// root for the nearest `package.json`, stopping at a `node_modules/<pkg>`
    /// boundary if `from_file` is inside one.
    fn nearest_package_json(
        &self,
        from_dir: &str,
    ) -> anyhow::Result<Option<(String, Arc<PackageJson>)>> {
        let boundary = node_modules_package_root(from_dir);
        let mut dir = from_dir.to_string();
        loop {
            if let Some(pkg) = self.cache.package_json_at(self.store, &self.project, &dir)? {
                return Ok(Some((dir, pkg)));
            }
            if boundary.as_deref() == Some(dir.as_str()) || dir == "/" {
                return Ok(None);
            }
            dir = dirname(&dir);
        }
    }

    fn resolve_subpath_import(
        &self,
        spec_without_hash: &str,
        from_file: &str,
    ) -> anyhow::Result<Option<ResolutionResult>> {
        let spec = format!("#{spec_without_hash}");
        let from_dir = dirname(from_file);
        let Some((pkg_dir, pkg)) = self.nearest_package_json(&from_dir)? else {
            self.logger.warn(format!("no package.json found while resolving subpath import {spec}"));
            return Ok(None);
        };
        let Some(imports) = &pkg.imports else {
            return Ok(None);
        };

        let rewrite_data = PackageExportRewriteData::try_from(imports)?;
        let mut out = String::new();
        let matched = rewrite_data.rewrite_relative_export(&spec, EXPORT_CONDITIONS, &mut out)?;
        let Some(matched) = matched else { return Ok(None) };
        let packagejson::exported_path::ExportedPathRef::Exported(resolved) = matched.rewritten_export else {
            return Ok(None);
        };
        let candidate = join(&[&pkg_dir, resolved]);
        Ok(self.extension_probe(&candidate)?.map(|path| ResolutionResult {
            path,
            is_builtin: false,
            is_node_module: false,
        }))
    }

    fn resolve_package(&self, name: &str, subpath: &str) -> anyhow::Result<Option<ResolutionResult>> {
        let pkg_dir = join(&["/node_modules", name]);
        let manifest = self.cache.package_json_at(self.store, &self.project, &pkg_dir)?;

        if let Some(pkg) = &manifest {
            if let Some(exports) = &pkg.exports {
                let relative_import = if subpath.is_empty() { ".".to_string() } else { format!("./{subpath}") };
                let rewrite_data = PackageExportRewriteData::try_from(exports)?;
                let mut out = String::new();
                if let Some(matched) =
                    rewrite_data.rewrite_relative_export(&relative_import, EXPORT_CONDITIONS, &mut out)?
                {
                    if let packagejson::exported_path::ExportedPathRef::Exported(resolved) = matched.rewritten_export {
                        let candidate = join(&[&pkg_dir, resolved]);
                        if let Some(path) = self.extension_probe(&candidate)? {
                            return Ok(Some(ResolutionResult { path, is_builtin: false, is_node_module: true }));
                        }
                    }
                }
            }

            if subpath.is_empty() {
                let entry = pkg
                    .module
                    .as_deref()
                    .or(pkg.main.as_deref())
                    .unwrap_or("index.js")
                    .trim_start_matches("./");
                let candidate = join(&[&pkg_dir, entry]);
                if let Some(path) = self.extension_probe(&candidate)? {
                    return Ok(Some(ResolutionResult { path, is_builtin: false, is_node_module: true }));
                }
            }
        }

        let direct_tail = if subpath.is_empty() { "index.js" } else { subpath };
        for fallback in [
            join(&[&pkg_dir, direct_tail]),
            join(&[&pkg_dir, "dist/index.js"]),
            join(&[&pkg_dir, "lib/index.js"]),
            join(&[&pkg_dir, "src/index.js"]),
        ] {
            if let Some(path) = self.extension_probe(&fallback)? {
                return Ok(Some(ResolutionResult { path, is_builtin: false, is_node_module: true }));
            }
        }

        Ok(None)
    }
}

/// If `path` sits inside a `node_modules/<pkg>` tree, returns that package's
/// root directory (handling the scoped `@scope/name` two-segment form).
fn node_modules_package_root(path: &str) -> Option<String> {
    const MARKER: &str = "/node_modules/";
    let idx = path.rfind(MARKER)?;
    let after = &path[idx + MARKER.len()..];
    let mut segments = after.splitn(3, '/');
    let first = segments.next()?;
    if let Some(second) = first.starts_with('@').then(|| segments.next()).flatten() {
        Some(format!("{}{}{}/{}", &path[..idx], MARKER, first, second))
    } else {
        Some(format!("{}{}{}", &path[..idx], MARKER, first))
    }
}
