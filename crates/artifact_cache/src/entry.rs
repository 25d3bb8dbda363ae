use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Everything about a cache entry except the transpiled code itself; this is
/// what gets persisted under `<metaDir>/<safeName>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryMeta {
    pub original_path: String,
    pub content_hash: String,
    pub deps: Vec<String>,
    #[serde(default)]
    pub dependents: BTreeSet<String>,
    pub mtime: u64,
    /// Logical access tick, not a wall-clock timestamp: bumped on every
    /// `get`/`set` by the cache's own monotonic counter so LRU ordering in
    /// tests is deterministic rather than racing the system clock.
    pub last_access: u64,
    pub size: u64,
}

/// A full in-memory cache entry: metadata plus the transpiled body that the
/// metadata's hash/deps describe.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub meta: CacheEntryMeta,
    pub code: String,
    pub source_map: Option<String>,
}

impl CacheEntry {
    pub fn original_path(&self) -> &str {
        &self.meta.original_path
    }
}

/// The inputs to [`crate::ArtifactCache::set`]: everything the transpiler
/// driver knows about a freshly produced artifact.
pub struct SetEntry {
    pub original_path: String,
    pub content_hash: String,
    pub code: String,
    pub source_map: Option<String>,
    pub deps: Vec<String>,
    pub mtime: u64,
}

/// Maps `appPath` to a filesystem-safe basename: every character outside
/// `[A-Za-z0-9.]` becomes `_`.
pub fn safe_name(app_path: &str) -> String {
    app_path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn safe_name_replaces_unsafe_chars() {
        assert_eq!(safe_name("/src/a-b/c.ts"), "_src_a_b_c.ts");
    }
}
