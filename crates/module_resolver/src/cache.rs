use std::sync::Arc;

use dashmap::DashMap;
use packagejson::PackageJson;
use virtual_store::FileStore;

/// Per-resolver memoization of `package.json` parses and existence probes,
/// keyed by the directory (for manifests) or exact path (for existence)
/// queried. Adapted from the teacher's `FileContextCache`/`DashMap`
/// memoization idiom to read through a [`FileStore`] instead of the OS
/// filesystem; entries persist for the life of the resolver instance
/// (content-hash checks at load time catch anything that goes stale).
#[derive(Default)]
pub struct ResolverCache {
    manifests: DashMap<String, Option<Arc<PackageJson>>>,
    existence: DashMap<String, bool>,
}

impl ResolverCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn package_json_at(
        &self,
        store: &dyn FileStore,
        project: &str,
        dir: &str,
    ) -> anyhow::Result<Option<Arc<PackageJson>>> {
        if let Some(cached) = self.manifests.get(dir) {
            return Ok(cached.clone());
        }

        let path = path_algebra::join(&[dir, "package.json"]);
        let parsed = match store.read(project, &path)? {
            Some(file) if !file.is_binary => match file.content {
                Some(content) => serde_json::from_str::<PackageJson>(&content).ok().map(Arc::new),
                None => None,
            },
            _ => None,
        };
        self.manifests.insert(dir.to_string(), parsed.clone());
        Ok(parsed)
    }

    pub fn file_exists(
        &self,
        store: &dyn FileStore,
        project: &str,
        path: &str,
    ) -> anyhow::Result<bool> {
        if let Some(cached) = self.existence.get(path) {
            return Ok(*cached);
        }

        let exists = matches!(
            store.read(project, path)?,
            Some(file) if file.kind == virtual_store::FileKind::File
        );
        self.existence.insert(path.to_string(), exists);
        Ok(exists)
    }
}
