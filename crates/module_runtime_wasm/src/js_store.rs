//! Adapts a JS-object file store (five plain functions) to [`FileStore`].
//! Every call crosses the wasm boundary synchronously, matching the core's
//! synchronous design (§2 SPEC note: "free of an async runtime dependency").

use js_sys::Function;
use virtual_store::{FileStore, StoreError, VirtualFile};
use wasm_bindgen::JsValue;

/// Bundles the five callbacks the host supplies for its persistent project
/// store (§4.2). Each is called as `fn(project, ...) -> JsValue`, throwing
/// on failure.
pub struct JsFileStore {
    read_fn: Function,
    list_by_prefix_fn: Function,
    create_fn: Function,
    save_fn: Function,
    delete_fn: Function,
}

impl JsFileStore {
    pub fn new(
        read_fn: Function,
        list_by_prefix_fn: Function,
        create_fn: Function,
        save_fn: Function,
        delete_fn: Function,
    ) -> Self {
        Self { read_fn, list_by_prefix_fn, create_fn, save_fn, delete_fn }
    }

    fn backend_error(project: &str, path: &str, thrown: JsValue) -> StoreError {
        let message = thrown.as_string().unwrap_or_else(|| format!("{thrown:?}"));
        StoreError::Backend { project: project.to_string(), path: path.to_string(), source: anyhow::anyhow!(message) }
    }
}

impl FileStore for JsFileStore {
    fn read(&self, project: &str, app_path: &str) -> Result<Option<VirtualFile>, StoreError> {
        let result = self
            .read_fn
            .call2(&JsValue::NULL, &JsValue::from_str(project), &JsValue::from_str(app_path))
            .map_err(|err| Self::backend_error(project, app_path, err))?;
        if result.is_null() || result.is_undefined() {
            return Ok(None);
        }
        serde_wasm_bindgen::from_value(result)
            .map_err(|err| StoreError::Backend { project: project.to_string(), path: app_path.to_string(), source: anyhow::anyhow!(err.to_string()) })
    }

    fn list_by_prefix(&self, project: &str, prefix: &str) -> Result<Vec<VirtualFile>, StoreError> {
        let result = self
            .list_by_prefix_fn
            .call2(&JsValue::NULL, &JsValue::from_str(project), &JsValue::from_str(prefix))
            .map_err(|err| Self::backend_error(project, prefix, err))?;
        serde_wasm_bindgen::from_value(result)
            .map_err(|err| StoreError::Backend { project: project.to_string(), path: prefix.to_string(), source: anyhow::anyhow!(err.to_string()) })
    }

    fn create(&self, project: &str, file: VirtualFile) -> Result<(), StoreError> {
        let path = file.path.clone();
        let file_js = serde_wasm_bindgen::to_value(&file)
            .map_err(|err| StoreError::Backend { project: project.to_string(), path: path.clone(), source: anyhow::anyhow!(err.to_string()) })?;
        self.create_fn
            .call2(&JsValue::NULL, &JsValue::from_str(project), &file_js)
            .map(|_| ())
            .map_err(|err| Self::backend_error(project, &path, err))
    }

    fn save(&self, project: &str, app_path: &str, content: String) -> Result<(), StoreError> {
        self.save_fn
            .call3(&JsValue::NULL, &JsValue::from_str(project), &JsValue::from_str(app_path), &JsValue::from_str(&content))
            .map(|_| ())
            .map_err(|err| Self::backend_error(project, app_path, err))
    }

    fn delete(&self, project: &str, app_path: &str) -> Result<(), StoreError> {
        self.delete_fn
            .call2(&JsValue::NULL, &JsValue::from_str(project), &JsValue::from_str(app_path))
            .map(|_| ())
            .map_err(|err| Self::backend_error(project, app_path, err))
    }
}
