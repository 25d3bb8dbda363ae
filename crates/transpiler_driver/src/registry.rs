use std::collections::HashMap;
use std::sync::Arc;

use crate::transpiler::Transpiler;

/// Collects transpiler capabilities keyed by the file extensions they
/// advertise (registration happens through an extension-style registry, per
/// spec §6), so the driver can dispatch by extension without knowing what
/// backend (SWC, Babel-standalone, a normalizer-only stub, …) is behind it.
#[derive(Default, Clone)]
pub struct TranspilerRegistry {
    by_extension: HashMap<String, Arc<dyn Transpiler>>,
}

impl TranspilerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, transpiler: Arc<dyn Transpiler>) {
        for ext in transpiler.extensions() {
            self.by_extension.insert(ext.to_string(), transpiler.clone());
        }
    }

    pub fn get(&self, ext: &str) -> Option<Arc<dyn Transpiler>> {
        self.by_extension.get(ext).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::{TranspileError, TranspileOptions, TranspileOutput};

    struct Stub;
    impl Transpiler for Stub {
        fn extensions(&self) -> &[&str] {
            &["ts", "tsx"]
        }
        fn transpile(&self, code: &str, _opts: TranspileOptions) -> Result<TranspileOutput, TranspileError> {
            Ok(TranspileOutput { code: code.to_string(), map: None, dependencies: None })
        }
    }

    #[test]
    fn registers_under_every_advertised_extension() {
        let mut registry = TranspilerRegistry::new();
        registry.register(Arc::new(Stub));
        assert!(registry.get("ts").is_some());
        assert!(registry.get("tsx").is_some());
        assert!(registry.get("jsx").is_none());
    }
}
