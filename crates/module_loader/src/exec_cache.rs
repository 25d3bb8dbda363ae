//! The execution cache (§3, §4.7): the in-memory map of evaluated module
//! exports for one session, keyed by concrete resolved path. Write-once per
//! path per session once `loaded`; resolves cycles by handing the
//! in-progress cell to a `loading` caller.

use dashmap::DashMap;

use crate::sandbox::{new_exports_cell, ExportsCell};

#[derive(Clone)]
pub struct ExecCacheEntry {
    pub exports: ExportsCell,
    pub loading: bool,
    pub loaded: bool,
}

#[derive(Default)]
pub struct ExecutionCache {
    entries: DashMap<String, ExecCacheEntry>,
    /// §4.7 step 6: bare package specifier -> resolved concrete path,
    /// populated as modules are loaded so a later synchronous `require` of
    /// the same bare name can find its pre-loaded entry without re-running
    /// resolution (§4.7.5).
    name_map: DashMap<String, String>,
}

pub enum Probe {
    /// No entry exists yet for this path; the caller should create one and
    /// begin loading it.
    Missing,
    /// A cycle: the entry is mid-load. Callers get the same (still filling
    /// in) cell.
    Loading(ExportsCell),
    Loaded(ExportsCell),
}

impl ExecutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `path`, distinguishing "missing" from "loading" (cycle) from
    /// "loaded".
    pub fn probe(&self, path: &str) -> Probe {
        match self.entries.get(path) {
            None => Probe::Missing,
            Some(entry) if entry.loaded => Probe::Loaded(entry.exports.clone()),
            Some(entry) => Probe::Loading(entry.exports.clone()),
        }
    }

    /// Begins loading `path`: inserts a fresh `loading` entry and returns its
    /// cell. Caller must already have confirmed via [`Self::probe`] that no
    /// entry exists.
    pub fn begin_loading(&self, path: &str) -> ExportsCell {
        let cell = new_exports_cell();
        self.entries.insert(
            path.to_string(),
            ExecCacheEntry { exports: cell.clone(), loading: true, loaded: false },
        );
        cell
    }

    pub fn mark_loaded(&self, path: &str) {
        if let Some(mut entry) = self.entries.get_mut(path) {
            entry.loading = false;
            entry.loaded = true;
        }
    }

    /// Discards a mid-load entry on failure (§4.7 step 7: "On any failure,
    /// delete the execution cache entry and propagate").
    pub fn abandon(&self, path: &str) {
        self.entries.remove(path);
    }

    pub fn record_bare_name(&self, spec: &str, path: &str) {
        self.name_map.insert(spec.to_string(), path.to_string());
    }

    pub fn resolved_bare_name(&self, spec: &str) -> Option<String> {
        self.name_map.get(spec).map(|v| v.clone())
    }

    pub fn get(&self, path: &str) -> Option<ExecCacheEntry> {
        self.entries.get(path).map(|e| e.clone())
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.name_map.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
