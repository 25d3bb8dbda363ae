//! Persistent, content-addressed cache of transpiled module artifacts, with
//! a bidirectional dependency graph so invalidation cascades to every
//! dependent and watermark-based LRU eviction keeps total size bounded.
//!
//! The bidirectional-graph shape is grounded on the teacher's
//! `unused_finder::graph::Graph` (`path_to_id` + per-node edge sets, walked
//! breadth-first); here the same shape drives cache invalidation instead of
//! usage tracking.

pub mod entry;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use dashmap::DashMap;
use runtime_logger::Logger;
use virtual_store::FileStore;

pub use entry::{safe_name, CacheEntry, CacheEntryMeta, SetEntry};

const DEFAULT_CEILING_BYTES: u64 = 100 * 1024 * 1024;
const DEFAULT_LOW_WATERMARK: f64 = 0.7;

const MODULES_DIR: &str = "/cache/modules";
const META_DIR: &str = "/cache/meta";

/// One cache instance per project, owned by a single loader (§5: the
/// in-memory map is owned by a single resolver+loader instance per project).
pub struct ArtifactCache<'s, L: Logger> {
    store: &'s dyn FileStore,
    project: String,
    entries: DashMap<String, CacheEntry>,
    ceiling_bytes: u64,
    low_watermark: f64,
    /// Logical access counter standing in for wall-clock `lastAccess`: GC
    /// orders purely by recency of use, so a monotonic tick is equivalent
    /// and keeps eviction order deterministic under test.
    clock: AtomicU64,
    logger: L,
}

impl<'s, L: Logger> ArtifactCache<'s, L> {
    pub fn new(store: &'s dyn FileStore, project: impl Into<String>, logger: L) -> Self {
        Self::with_ceiling(store, project, DEFAULT_CEILING_BYTES, DEFAULT_LOW_WATERMARK, logger)
    }

    pub fn with_ceiling(
        store: &'s dyn FileStore,
        project: impl Into<String>,
        ceiling_bytes: u64,
        low_watermark: f64,
        logger: L,
    ) -> Self {
        Self {
            store,
            project: project.into(),
            entries: DashMap::new(),
            ceiling_bytes,
            low_watermark,
            clock: AtomicU64::new(0),
            logger,
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Looks up `app_path`. If `current_hash` is supplied and disagrees with
    /// the stored hash, the entry (and everything that depends on it) is
    /// invalidated and `None` is returned. Otherwise bumps `lastAccess`.
    pub fn get(&self, app_path: &str, current_hash: Option<&str>) -> Result<Option<CacheEntry>> {
        let stale = match self.entries.get(app_path) {
            Some(entry) => matches!(current_hash, Some(hash) if hash != entry.meta.content_hash),
            None => return Ok(None),
        };
        if stale {
            self.invalidate(app_path)?;
            return Ok(None);
        }

        let tick = self.tick();
        let Some(mut entry) = self.entries.get_mut(app_path) else {
            return Ok(None);
        };
        entry.meta.last_access = tick;
        Ok(Some(entry.clone()))
    }

    /// Inserts or replaces an entry: detaches any stale reverse-links if
    /// this path was already cached, persists the new entry, re-links
    /// `dependents` on each of its `deps` that are themselves cached, then
    /// runs GC.
    pub fn set(&self, params: SetEntry) -> Result<()> {
        let SetEntry { original_path, content_hash, code, source_map, deps, mtime } = params;

        if self.entries.contains_key(&original_path) {
            self.detach_from_deps(&original_path);
        }

        let meta = CacheEntryMeta {
            original_path: original_path.clone(),
            content_hash,
            deps: deps.clone(),
            dependents: BTreeSet::new(),
            mtime,
            last_access: self.tick(),
            size: code.len() as u64,
        };
        self.persist(&meta, &code)?;
        self.entries.insert(original_path.clone(), CacheEntry { meta, code, source_map });

        for dep in &deps {
            if let Some(mut dep_entry) = self.entries.get_mut(dep) {
                dep_entry.meta.dependents.insert(original_path.clone());
            }
        }

        self.gc()
    }

    fn detach_from_deps(&self, app_path: &str) {
        let deps = self.entries.get(app_path).map(|e| e.meta.deps.clone()).unwrap_or_default();
        for dep in deps {
            if let Some(mut dep_entry) = self.entries.get_mut(&dep) {
                dep_entry.meta.dependents.remove(app_path);
            }
        }
    }

    /// Invalidates `app_path`: recursively invalidates every dependent
    /// first (so nothing downstream can observe a stale artifact), then
    /// detaches `app_path` from its own dependencies and drops it from
    /// memory and the store.
    pub fn invalidate(&self, app_path: &str) -> Result<()> {
        let dependents: Vec<String> =
            self.entries.get(app_path).map(|e| e.meta.dependents.iter().cloned().collect()).unwrap_or_default();
        for dependent in dependents {
            self.invalidate(&dependent)?;
        }

        self.detach_from_deps(app_path);
        if self.entries.remove(app_path).is_some() {
            self.delete_persisted(app_path);
        }
        Ok(())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dependents_of(&self, app_path: &str) -> BTreeSet<String> {
        self.entries.get(app_path).map(|e| e.meta.dependents.clone()).unwrap_or_default()
    }

    fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.meta.size).sum()
    }

    /// Watermark eviction (§4.6): once total size exceeds the ceiling, evict
    /// the least-recently-accessed entries via `invalidate` (so the
    /// dependency graph stays consistent) until usage is at or below
    /// `low_watermark * ceiling`.
    fn gc(&self) -> Result<()> {
        if self.total_size() <= self.ceiling_bytes {
            return Ok(());
        }
        let target = (self.ceiling_bytes as f64 * self.low_watermark) as u64;
        let mut by_access: Vec<(u64, String)> =
            self.entries.iter().map(|e| (e.meta.last_access, e.key().clone())).collect();
        by_access.sort_by_key(|(tick, _)| *tick);

        for (_, path) in by_access {
            if self.total_size() <= target {
                break;
            }
            if self.entries.contains_key(&path) {
                self.invalidate(&path)?;
            }
        }
        Ok(())
    }

    fn persist(&self, meta: &CacheEntryMeta, code: &str) -> Result<()> {
        let name = safe_name(&meta.original_path);
        let meta_json = serde_json::to_string(meta).context("serializing cache entry metadata")?;
        self.store
            .save(&self.project, &format!("{META_DIR}/{name}.json"), meta_json)
            .context("persisting cache entry metadata")?;
        self.store
            .save(&self.project, &format!("{MODULES_DIR}/{name}.js"), code.to_string())
            .context("persisting cache entry code")?;
        Ok(())
    }

    fn delete_persisted(&self, app_path: &str) {
        let name = safe_name(app_path);
        if let Err(err) = self.store.delete(&self.project, &format!("{META_DIR}/{name}.json")) {
            self.logger.warn(format!("failed to delete cache metadata for {app_path}: {err}"));
        }
        if let Err(err) = self.store.delete(&self.project, &format!("{MODULES_DIR}/{name}.js")) {
            self.logger.warn(format!("failed to delete cache code blob for {app_path}: {err}"));
        }
    }

    /// Rebuilds the in-memory map from `<metaDir>`/`<modulesDir>` on
    /// startup. Entries whose code blob is missing or whose metadata fails
    /// to parse are silently skipped.
    pub fn load_from_store(&self) -> Result<()> {
        let metas = self.store.list_by_prefix(&self.project, META_DIR).context("listing cache metadata")?;
        for file in metas {
            let Some(content) = file.content else { continue };
            let meta = match serde_json::from_str::<CacheEntryMeta>(&content) {
                Ok(meta) => meta,
                Err(_) => {
                    self.logger.warn(format!("skipping unparsable cache metadata at {}", file.path));
                    continue;
                }
            };
            let name = safe_name(&meta.original_path);
            let code_path = format!("{MODULES_DIR}/{name}.js");
            let code = match self.store.read(&self.project, &code_path) {
                Ok(Some(f)) => f.content,
                _ => None,
            };
            let Some(code) = code else {
                self.logger.warn(format!("skipping cache entry with missing code blob: {}", meta.original_path));
                continue;
            };
            self.entries.insert(meta.original_path.clone(), CacheEntry { meta, code, source_map: None });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use runtime_logger::VecLogger;
    use virtual_store::InMemoryFileStore;

    fn cache(store: &InMemoryFileStore) -> ArtifactCache<'_, &'static VecLogger> {
        let logger: &'static VecLogger = Box::leak(Box::new(VecLogger::new()));
        ArtifactCache::new(store, "p", logger)
    }

    fn set(cache: &ArtifactCache<'_, &'static VecLogger>, path: &str, hash: &str, deps: &[&str]) {
        cache
            .set(SetEntry {
                original_path: path.to_string(),
                content_hash: hash.to_string(),
                code: format!("/* {path} */").to_string(),
                source_map: None,
                deps: deps.iter().map(|s| s.to_string()).collect(),
                mtime: 0,
            })
            .unwrap();
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = InMemoryFileStore::new();
        let cache = cache(&store);
        set(&cache, "/y.js", "h1", &[]);
        let got = cache.get("/y.js", None).unwrap().unwrap();
        assert_eq!(got.meta.content_hash, "h1");
    }

    #[test]
    fn dependents_are_linked_bidirectionally() {
        let store = InMemoryFileStore::new();
        let cache = cache(&store);
        set(&cache, "/y.js", "h1", &[]);
        set(&cache, "/x.js", "h2", &["/y.js"]);
        assert!(cache.dependents_of("/y.js").contains("/x.js"));
    }

    #[test]
    fn stale_hash_cascades_invalidation_to_dependents() {
        let store = InMemoryFileStore::new();
        let cache = cache(&store);
        set(&cache, "/y.js", "h1", &[]);
        set(&cache, "/x.js", "h2", &["/y.js"]);

        assert!(cache.get("/y.js", Some("h1-new")).unwrap().is_none());
        assert!(cache.get("/x.js", None).unwrap().is_none());
    }

    #[test]
    fn invalidate_removes_persisted_blobs() {
        let store = InMemoryFileStore::new();
        let cache = cache(&store);
        set(&cache, "/y.js", "h1", &[]);
        let name = safe_name("/y.js");
        assert!(store.exists("p", &format!("/cache/modules/{name}.js")).unwrap());
        cache.invalidate("/y.js").unwrap();
        assert!(!store.exists("p", &format!("/cache/modules/{name}.js")).unwrap());
        assert!(!store.exists("p", &format!("/cache/meta/{name}.json")).unwrap());
    }

    #[test]
    fn gc_evicts_least_recently_used_until_under_low_watermark() {
        let store = InMemoryFileStore::new();
        let logger: &'static VecLogger = Box::leak(Box::new(VecLogger::new()));
        // `set` runs GC on every call (§4.6: "After any set... if total size
        // exceeds the ceiling"), so the ceiling/watermark here are chosen so
        // that inserting all ten 200-B entries (2000B) never itself crosses
        // the 2100B ceiling -- GC only fires once, on the 11th insert, and
        // the 1312B target (2100 * 0.625) sits with >80B of margin on both
        // sides of the 1200B/1400B eviction steps below, so the outcome
        // doesn't depend on float-rounding of the watermark multiply.
        let cache = ArtifactCache::with_ceiling(&store, "p", 2100, 0.625, logger);

        for i in 0..10 {
            cache
                .set(SetEntry {
                    original_path: format!("/m{i}.js"),
                    content_hash: "h".to_string(),
                    code: "x".repeat(200),
                    source_map: None,
                    deps: vec![],
                    mtime: 0,
                })
                .unwrap();
        }
        assert_eq!(cache.total_size(), 2000, "all ten entries fit under the ceiling, no GC yet");

        // touch entries 0..5 so they're most-recently-used
        for i in 0..5 {
            cache.get(&format!("/m{i}.js"), None).unwrap();
        }

        cache
            .set(SetEntry {
                original_path: "/m10.js".to_string(),
                content_hash: "h".to_string(),
                code: "x".repeat(200),
                source_map: None,
                deps: vec![],
                mtime: 0,
            })
            .unwrap();

        assert_eq!(cache.total_size(), 1200);
        for i in 0..5 {
            assert!(cache.get(&format!("/m{i}.js"), None).unwrap().is_some(), "entry {i} should survive GC");
        }
        assert!(cache.get("/m10.js", None).unwrap().is_some(), "the newly inserted entry should survive GC");
        for i in 5..10 {
            assert!(cache.get(&format!("/m{i}.js"), None).unwrap().is_none(), "untouched entry {i} should be evicted");
        }
    }

    #[test]
    fn load_from_store_skips_entries_with_missing_code() {
        let store = InMemoryFileStore::new();
        store.save("p", "/cache/meta/_a.js.json", serde_json::to_string(&CacheEntryMeta {
            original_path: "/a.js".to_string(),
            content_hash: "h".to_string(),
            deps: vec![],
            dependents: Default::default(),
            mtime: 0,
            last_access: 0,
            size: 0,
        }).unwrap()).unwrap();

        let cache = cache(&store);
        cache.load_from_store().unwrap();
        assert!(cache.is_empty());
    }
}
