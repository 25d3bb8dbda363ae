//! The read-only (for the core) view over the host's persistent project
//! store, plus an in-memory fixture used to exercise the core without a
//! host at all.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use path_algebra::to_app_path;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Folder,
}

/// A single entry in the virtual project tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualFile {
    pub id: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub content: Option<String>,
    #[serde(default)]
    pub is_binary: bool,
    #[serde(default)]
    pub binary: Option<Vec<u8>>,
}

impl VirtualFile {
    pub fn file(id: impl Into<String>, path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: to_app_path(&path.into()),
            kind: FileKind::File,
            content: Some(content.into()),
            is_binary: false,
            binary: None,
        }
    }

    pub fn folder(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: to_app_path(&path.into()),
            kind: FileKind::Folder,
            content: None,
            is_binary: false,
            binary: None,
        }
    }

    pub fn binary(id: impl Into<String>, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            path: to_app_path(&path.into()),
            kind: FileKind::File,
            content: None,
            is_binary: true,
            binary: Some(bytes),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store operation failed for {project}:{path}: {source}")]
    Backend {
        project: String,
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

/// The subset of the host's file store the core consumes. Reads are used by
/// the resolver and the loader; writes are used only by the artifact cache to
/// persist transpile output under `/cache/modules` and `/cache/meta`.
pub trait FileStore {
    fn read(&self, project: &str, app_path: &str) -> Result<Option<VirtualFile>, StoreError>;
    fn list_by_prefix(&self, project: &str, prefix: &str) -> Result<Vec<VirtualFile>, StoreError>;
    fn exists(&self, project: &str, app_path: &str) -> Result<bool, StoreError> {
        Ok(self.read(project, app_path)?.is_some())
    }

    fn create(&self, project: &str, file: VirtualFile) -> Result<(), StoreError>;
    fn save(&self, project: &str, app_path: &str, content: String) -> Result<(), StoreError>;
    fn delete(&self, project: &str, app_path: &str) -> Result<(), StoreError>;
}

/// In-memory [`FileStore`] fixture. Stands in for the host's persistent store
/// in tests, since the store itself is virtual by design.
#[derive(Default)]
pub struct InMemoryFileStore {
    files: DashMap<(String, String), VirtualFile>,
    next_id: AtomicU64,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_id(&self) -> String {
        format!("vf-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Seeds a file (creating parent folders implicitly) for test setup.
    pub fn put_file(&self, project: &str, path: &str, content: impl Into<String>) {
        let id = self.fresh_id();
        let path = to_app_path(path);
        self.files
            .insert((project.to_string(), path.clone()), VirtualFile::file(id, path, content));
    }

    pub fn put_folder(&self, project: &str, path: &str) {
        let id = self.fresh_id();
        let path = to_app_path(path);
        self.files
            .insert((project.to_string(), path.clone()), VirtualFile::folder(id, path));
    }
}

impl FileStore for InMemoryFileStore {
    fn read(&self, project: &str, app_path: &str) -> Result<Option<VirtualFile>, StoreError> {
        let key = (project.to_string(), to_app_path(app_path));
        Ok(self.files.get(&key).map(|entry| entry.value().clone()))
    }

    fn list_by_prefix(&self, project: &str, prefix: &str) -> Result<Vec<VirtualFile>, StoreError> {
        let prefix = to_app_path(prefix);
        Ok(self
            .files
            .iter()
            .filter(|entry| {
                let (p, path) = entry.key();
                p == project && path_algebra::has_prefix(path, &prefix) && path != &prefix
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn create(&self, project: &str, file: VirtualFile) -> Result<(), StoreError> {
        let path = to_app_path(&file.path);
        self.files.insert((project.to_string(), path), file);
        Ok(())
    }

    fn save(&self, project: &str, app_path: &str, content: String) -> Result<(), StoreError> {
        let path = to_app_path(app_path);
        let id = self
            .files
            .get(&(project.to_string(), path.clone()))
            .map(|f| f.id.clone())
            .unwrap_or_else(|| self.fresh_id());
        self.files
            .insert((project.to_string(), path.clone()), VirtualFile::file(id, path, content));
        Ok(())
    }

    fn delete(&self, project: &str, app_path: &str) -> Result<(), StoreError> {
        self.files.remove(&(project.to_string(), to_app_path(app_path)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_missing_returns_none() {
        let store = InMemoryFileStore::new();
        assert!(store.read("p", "/a.js").unwrap().is_none());
    }

    #[test]
    fn write_then_read_round_trips() {
        let store = InMemoryFileStore::new();
        store.put_file("p", "/a.js", "console.log(1)");
        let f = store.read("p", "/a.js").unwrap().unwrap();
        assert_eq!(f.content.as_deref(), Some("console.log(1)"));
        assert!(store.exists("p", "/a.js").unwrap());
    }

    #[test]
    fn list_by_prefix_excludes_the_prefix_itself() {
        let store = InMemoryFileStore::new();
        store.put_folder("p", "/src");
        store.put_file("p", "/src/a.js", "");
        store.put_file("p", "/src/sub/b.js", "");
        store.put_file("p", "/other.js", "");
        let mut paths: Vec<_> = store
            .list_by_prefix("p", "/src")
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["/src/a.js", "/src/sub/b.js"]);
    }

    #[test]
    fn save_overwrites_existing_content_keeping_id() {
        let store = InMemoryFileStore::new();
        store.put_file("p", "/a.js", "old");
        let id_before = store.read("p", "/a.js").unwrap().unwrap().id;
        store.save("p", "/a.js", "new".to_string()).unwrap();
        let after = store.read("p", "/a.js").unwrap().unwrap();
        assert_eq!(after.content.as_deref(), Some("new"));
        assert_eq!(after.id, id_before);
    }

    #[test]
    fn delete_removes_entry() {
        let store = InMemoryFileStore::new();
        store.put_file("p", "/a.js", "x");
        store.delete("p", "/a.js").unwrap();
        assert!(store.read("p", "/a.js").unwrap().is_none());
    }
}
