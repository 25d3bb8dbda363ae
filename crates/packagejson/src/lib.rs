//! Parsed `package.json` manifest types.
//!
//! Only the fields this runtime's resolver actually consults are modeled:
//! `name`, `version`, `type`, `main`, `module`, `exports`, `imports`,
//! `dependencies`, `devDependencies`. Unknown fields are ignored by serde's
//! default behavior; malformed `exports`/`imports` leaves are tolerated via
//! [`exported_path::ExportedPath::Unrecognized`] rather than failing the
//! whole parse.

pub mod exported_path;

use std::collections::HashMap;

use ahashmap::AHashMap;
use exported_path::ExportedPath;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    Module,
    Commonjs,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageJson {
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub module_type: Option<ModuleType>,
    pub main: Option<String>,
    pub module: Option<String>,
    pub exports: Option<PackageJsonExports>,
    pub imports: Option<PackageJsonExports>,
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: HashMap<String, String>,
}

/// A single `exports`/`imports` map value: either a bare path (sugar for the
/// `"default"` condition) or a map of condition name -> path.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageJsonExport {
    Single(Option<String>),
    Conditional(AHashMap<String, ExportedPath>),
}

struct PackageJsonExportVisitor;

impl<'de> serde::de::Visitor<'de> for PackageJsonExportVisitor {
    type Value = PackageJsonExport;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a path string, null, false, or a condition map")
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(PackageJsonExport::Single(Some(s.to_string())))
    }

    fn visit_string<E>(self, s: String) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(PackageJsonExport::Single(Some(s)))
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(PackageJsonExport::Single(None))
    }

    fn visit_bool<E>(self, _v: bool) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        // Neither `true` nor `false` names a path; both leave this subpath
        // unexported rather than failing the whole manifest parse.
        Ok(PackageJsonExport::Single(None))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut out: AHashMap<String, ExportedPath> = AHashMap::default();
        while let Some((k, v)) = map.next_entry::<String, ExportedPath>()? {
            out.insert(k, v);
        }
        Ok(PackageJsonExport::Conditional(out))
    }
}

impl<'de> Deserialize<'de> for PackageJsonExport {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(PackageJsonExportVisitor)
    }
}

/// The top-level `exports`/`imports` field, normalized to a subpath map
/// (`"."`, `"./foo"`, ...) regardless of which of the three package.json
/// sugar forms was used:
///
/// - a bare string (sugar for `{".": "<string>"}`)
/// - a condition map (sugar for `{".": {<condition map>}}`)
/// - an explicit subpath map (used as-is)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageJsonExports(AHashMap<String, PackageJsonExport>);

impl PackageJsonExports {
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PackageJsonExport)> {
        self.0.iter()
    }

    pub fn get(&self, key: &str) -> Option<&PackageJsonExport> {
        self.0.get(key)
    }
}

impl<'de> Deserialize<'de> for PackageJsonExports {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_json_value(value))
    }
}

impl PackageJsonExports {
    fn from_json_value(value: serde_json::Value) -> Self {
        let mut out: AHashMap<String, PackageJsonExport> = AHashMap::default();
        match value {
            serde_json::Value::String(s) => {
                out.insert(".".to_string(), PackageJsonExport::Single(Some(s)));
            }
            serde_json::Value::Null => {
                out.insert(".".to_string(), PackageJsonExport::Single(None));
            }
            serde_json::Value::Bool(_) => {
                out.insert(".".to_string(), PackageJsonExport::Single(None));
            }
            serde_json::Value::Object(obj) => {
                let is_subpath_map = obj.keys().any(|k| k.starts_with('.') || k.starts_with('#'));
                if is_subpath_map || obj.is_empty() {
                    for (k, v) in obj {
                        if let Ok(parsed) = serde_json::from_value::<PackageJsonExport>(v) {
                            out.insert(k, parsed);
                        }
                    }
                } else {
                    let mut conditions: AHashMap<String, ExportedPath> = AHashMap::default();
                    for (k, v) in obj {
                        if let Ok(parsed) = serde_json::from_value::<ExportedPath>(v) {
                            conditions.insert(k, parsed);
                        }
                    }
                    out.insert(".".to_string(), PackageJsonExport::Conditional(conditions));
                }
            }
            // arrays, numbers: not a valid exports shape at all. Tolerate it
            // the same way ExportedPath tolerates unrecognized leaves.
            _ => {}
        }
        Self(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_minimal_manifest() {
        let pkg: PackageJson = serde_json::from_str(r#"{"name": "foo", "main": "index.js"}"#).unwrap();
        assert_eq!(pkg.name.as_deref(), Some("foo"));
        assert_eq!(pkg.main.as_deref(), Some("index.js"));
        assert!(pkg.exports.is_none());
    }

    #[test]
    fn exports_string_sugar_normalizes_to_dot_key() {
        let pkg: PackageJson = serde_json::from_str(r#"{"exports": "./index.js"}"#).unwrap();
        let exports = pkg.exports.unwrap();
        assert_eq!(
            exports.get("."),
            Some(&PackageJsonExport::Single(Some("./index.js".to_string())))
        );
    }

    #[test]
    fn exports_condition_map_sugar_normalizes_to_dot_key() {
        let pkg: PackageJson = serde_json::from_str(
            r#"{"exports": {"import": "./esm/index.js", "require": "./cjs/index.js"}}"#,
        )
        .unwrap();
        let exports = pkg.exports.unwrap();
        match exports.get(".") {
            Some(PackageJsonExport::Conditional(map)) => {
                assert_eq!(
                    map.get("import"),
                    Some(&ExportedPath::Exported("./esm/index.js".to_string()))
                );
            }
            other => panic!("expected conditional dot export, got {other:?}"),
        }
    }

    #[test]
    fn exports_subpath_map_is_used_as_is() {
        let pkg: PackageJson = serde_json::from_str(
            r#"{"exports": {".": "./index.js", "./feature": "./feature.js"}}"#,
        )
        .unwrap();
        let exports = pkg.exports.unwrap();
        assert_eq!(
            exports.get("./feature"),
            Some(&PackageJsonExport::Single(Some("./feature.js".to_string())))
        );
    }

    #[test]
    fn imports_subpath_map_keys_start_with_hash() {
        let pkg: PackageJson =
            serde_json::from_str(r##"{"imports": {"#internal/*": "./lib/*.js"}}"##).unwrap();
        let imports = pkg.imports.unwrap();
        assert_eq!(
            imports.get("#internal/*"),
            Some(&PackageJsonExport::Single(Some("./lib/*.js".to_string())))
        );
    }

    #[test]
    fn module_type_field() {
        let pkg: PackageJson = serde_json::from_str(r#"{"type": "module"}"#).unwrap();
        assert_eq!(pkg.module_type, Some(ModuleType::Module));
    }
}
