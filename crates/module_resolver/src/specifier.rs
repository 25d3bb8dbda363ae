/// The fixed built-in module set. Resolving any of these short-circuits the
/// rest of the algorithm.
pub const BUILTINS: &[&str] = &[
    "fs",
    "fs/promises",
    "path",
    "os",
    "util",
    "http",
    "https",
    "buffer",
    "readline",
    "crypto",
    "stream",
    "events",
    "url",
    "querystring",
    "assert",
    "child_process",
    "cluster",
    "dgram",
    "dns",
    "domain",
    "net",
    "tls",
    "tty",
    "zlib",
];

pub fn is_builtin(spec: &str) -> bool {
    BUILTINS.contains(&spec)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier<'a> {
    Builtin(&'a str),
    SubpathImport(&'a str),
    Relative(&'a str),
    Alias(&'a str),
    Absolute(&'a str),
    Package { name: String, subpath: String },
}

/// Classifies a specifier by its leading token, per the resolver's §4.3
/// dispatch order. Does not touch the file store.
pub fn classify(spec: &str) -> Specifier<'_> {
    if is_builtin(spec) {
        return Specifier::Builtin(spec);
    }
    if let Some(rest) = spec.strip_prefix('#') {
        return Specifier::SubpathImport(rest);
    }
    if spec.starts_with("./") || spec.starts_with("../") || spec == "." || spec == ".." {
        return Specifier::Relative(spec);
    }
    if let Some(rest) = spec.strip_prefix("@/") {
        return Specifier::Alias(rest);
    }
    if spec.starts_with('/') {
        return Specifier::Absolute(spec);
    }

    let (name, subpath) = split_package_specifier(spec);
    Specifier::Package { name, subpath }
}

/// Splits a bare package specifier into `(packageName, subpath)`, handling
/// the scoped `@scope/name[/tail]` form (two segments consumed for the
/// package name) and the unscoped `name[/tail]` form.
fn split_package_specifier(spec: &str) -> (String, String) {
    if let Some(rest) = spec.strip_prefix('@') {
        // scoped: @scope/name[/tail]
        if let Some(slash) = rest.find('/') {
            let (scope, after_scope) = rest.split_at(slash);
            let after_scope = &after_scope[1..];
            return match after_scope.find('/') {
                Some(tail_slash) => {
                    let (name, tail) = after_scope.split_at(tail_slash);
                    (format!("@{scope}/{name}"), tail[1..].to_string())
                }
                None => (format!("@{scope}/{after_scope}"), String::new()),
            };
        }
        return (spec.to_string(), String::new());
    }

    match spec.find('/') {
        Some(idx) => {
            let (name, tail) = spec.split_at(idx);
            (name.to_string(), tail[1..].to_string())
        }
        None => (spec.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_builtin() {
        assert_eq!(classify("fs"), Specifier::Builtin("fs"));
    }

    #[test]
    fn classifies_subpath_import() {
        assert_eq!(classify("#internal/util"), Specifier::SubpathImport("internal/util"));
    }

    #[test]
    fn classifies_relative() {
        assert_eq!(classify("./a"), Specifier::Relative("./a"));
        assert_eq!(classify("../a"), Specifier::Relative("../a"));
    }

    #[test]
    fn classifies_alias() {
        assert_eq!(classify("@/util/hi"), Specifier::Alias("util/hi"));
    }

    #[test]
    fn classifies_absolute() {
        assert_eq!(classify("/abs/path.js"), Specifier::Absolute("/abs/path.js"));
    }

    #[test]
    fn classifies_unscoped_package() {
        assert_eq!(
            classify("lodash/fp"),
            Specifier::Package { name: "lodash".to_string(), subpath: "fp".to_string() }
        );
        assert_eq!(
            classify("lodash"),
            Specifier::Package { name: "lodash".to_string(), subpath: String::new() }
        );
    }

    #[test]
    fn classifies_scoped_package() {
        assert_eq!(
            classify("@scope/name/sub/path"),
            Specifier::Package {
                name: "@scope/name".to_string(),
                subpath: "sub/path".to_string()
            }
        );
        assert_eq!(
            classify("@scope/name"),
            Specifier::Package { name: "@scope/name".to_string(), subpath: String::new() }
        );
    }
}
