//! A map, provided by the host, from builtin module specifier name (`fs`,
//! `path`, …) to the host's emulated module object. The core never
//! implements a builtin itself — it only keys into this map and returns a
//! stable object per name for the session (§4.8).

use std::collections::HashMap;

use serde_json::Value;

/// A host-emulated builtin module object (e.g. `fs`'s `{readFile, writeFile,
/// …}`). Represented as an opaque JSON value since the host, not the core,
/// defines its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinModule(pub Value);

impl BuiltinModule {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

/// Populated once by the host at construction time; the loader only reads
/// from it.
#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    modules: HashMap<&'static str, BuiltinModule>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, module: BuiltinModule) {
        self.modules.insert(name, module);
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinModule> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn registers_and_returns_the_same_object_every_time() {
        let mut registry = BuiltinRegistry::new();
        registry.register("fs", BuiltinModule::new(json!({"readFile": "stub"})));

        let first = registry.get("fs").unwrap().value().clone();
        let second = registry.get("fs").unwrap().value().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn unregistered_name_is_absent() {
        let registry = BuiltinRegistry::new();
        assert!(registry.get("path").is_none());
        assert!(!registry.contains("path"));
    }
}
