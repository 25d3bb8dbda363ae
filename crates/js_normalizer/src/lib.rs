//! Regex-driven rewrite from ES-module / CommonJS mixed source into an
//! evaluable CommonJS body, per the rewrite table in the runtime's spec.
//!
//! Chosen for zero-dependency footprint in a worker context (mirrors the
//! teacher's own use of `regex` for lightweight, non-AST text transforms in
//! fence-pattern matching): this is intentionally not a parser. Ambiguous
//! or pathological input degrades to leaving text unmatched rather than
//! panicking.

mod mask;
mod pattern;

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use mask::Mask;

/// Output of [`normalize`]: an evaluable CommonJS body plus the deduplicated,
/// appearance-ordered set of specifiers the source declared a dependency on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeResult {
    pub code: String,
    pub dependencies: Vec<String>,
}

lazy_static! {
    static ref IMPORT_NAMESPACE: Regex =
        Regex::new(r#"import\s*\*\s*as\s+(\w+)\s+from\s*(['"])([^'"]+)\2\s*;?"#).unwrap();
    static ref IMPORT_DEFAULT_AND_NAMED: Regex = Regex::new(
        r#"import\s+(\w+)\s*,\s*\{([^}]*)\}\s*from\s*(['"])([^'"]+)\3\s*;?"#
    )
    .unwrap();
    static ref IMPORT_DEFAULT: Regex =
        Regex::new(r#"import\s+(\w+)\s+from\s*(['"])([^'"]+)\2\s*;?"#).unwrap();
    static ref IMPORT_NAMED: Regex =
        Regex::new(r#"import\s*\{([^}]*)\}\s*from\s*(['"])([^'"]+)\2\s*;?"#).unwrap();
    static ref IMPORT_SIDE_EFFECT: Regex = Regex::new(r#"import\s*(['"])([^'"]+)\1\s*;?"#).unwrap();
    static ref EXPORT_DEFAULT: Regex = Regex::new(r"export\s+default\s+").unwrap();
    static ref EXPORT_DECL: Regex =
        Regex::new(r"export\s+(const|let|var)\s+([\s\S]+?);").unwrap();
    static ref EXPORT_FUNCTION: Regex =
        Regex::new(r"export\s+(function\s*\*?\s*(\w+))").unwrap();
    static ref EXPORT_CLASS: Regex = Regex::new(r"export\s+(class\s+(\w+))").unwrap();
    static ref EXPORT_NAMED_FROM: Regex =
        Regex::new(r#"export\s*\{([^}]*)\}\s*from\s*(['"])([^'"]+)\2\s*;?"#).unwrap();
    static ref EXPORT_NAMED: Regex = Regex::new(r"export\s*\{([^}]*)\}\s*;?").unwrap();
    static ref EXPORT_STAR_FROM: Regex =
        Regex::new(r#"export\s*\*\s*from\s*(['"])([^'"]+)\1\s*;?"#).unwrap();
    static ref REQUIRE_CALL: Regex = Regex::new(r#"require\(\s*(['"])([^'"]+)\1\s*\)"#).unwrap();
}

/// Splits a `{a, b as c}` import/export brace list on top-level commas.
fn split_named_list(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| match item.split_once(" as ") {
            Some((orig, local)) => (orig.trim().to_string(), local.trim().to_string()),
            None => (item.to_string(), item.to_string()),
        })
        .collect()
}

pub fn normalize(source: &str) -> NormalizeResult {
    let mut mask = Mask::new();
    let masked = mask.mask(source);

    let mut declared_names: Vec<String> = Vec::new();
    let mut already_assigned: HashSet<String> = HashSet::new();
    let mut from_counter: usize = 0;

    let mut code = masked;

    code = IMPORT_NAMESPACE
        .replace_all(&code, |caps: &Captures| {
            format!("const {} = require('{}')", &caps[1], &caps[3])
        })
        .into_owned();

    code = IMPORT_DEFAULT_AND_NAMED
        .replace_all(&code, |caps: &Captures| {
            from_counter += 1;
            let tmp = format!("__t{from_counter}");
            let default_name = &caps[1];
            let named = split_named_list(&caps[2])
                .into_iter()
                .map(|(orig, local)| {
                    if orig == local {
                        orig
                    } else {
                        format!("{orig}: {local}")
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "const {tmp} = require('{}'); const {default_name} = ({tmp} && {tmp}.default!==undefined)?{tmp}.default:{tmp}; const {{{named}}} = {tmp}",
                &caps[4]
            )
        })
        .into_owned();

    code = IMPORT_DEFAULT
        .replace_all(&code, |caps: &Captures| {
            let name = &caps[1];
            format!(
                "const {name} = (t => t && t.default!==undefined ? t.default : t)(require('{}'))",
                &caps[3]
            )
        })
        .into_owned();

    code = IMPORT_NAMED
        .replace_all(&code, |caps: &Captures| {
            let named = split_named_list(&caps[1])
                .into_iter()
                .map(|(orig, local)| if orig == local { orig } else { format!("{orig}: {local}") })
                .collect::<Vec<_>>()
                .join(", ");
            format!("const {{ {named} }} = require('{}')", &caps[2])
        })
        .into_owned();

    code = IMPORT_SIDE_EFFECT
        .replace_all(&code, |caps: &Captures| format!("require('{}')", &caps[2]))
        .into_owned();

    code = EXPORT_DEFAULT.replace_all(&code, "module.exports.default = ").into_owned();

    code = EXPORT_DECL
        .replace_all(&code, |caps: &Captures| {
            for name in pattern::collect_declarator_names(&caps[2]) {
                declared_names.push(name);
            }
            format!("{} {};", &caps[1], &caps[2])
        })
        .into_owned();

    code = EXPORT_FUNCTION
        .replace_all(&code, |caps: &Captures| {
            declared_names.push(caps[2].to_string());
            caps[1].to_string()
        })
        .into_owned();

    code = EXPORT_CLASS
        .replace_all(&code, |caps: &Captures| {
            declared_names.push(caps[2].to_string());
            caps[1].to_string()
        })
        .into_owned();

    code = EXPORT_NAMED_FROM
        .replace_all(&code, |caps: &Captures| {
            from_counter += 1;
            let tmp = format!("__r{from_counter}");
            let mut out = format!("const {tmp} = require('{}');", &caps[3]);
            for (orig, local) in split_named_list(&caps[1]) {
                already_assigned.insert(local.clone());
                out.push_str(&format!(" module.exports.{local} = {tmp}.{orig};"));
            }
            out
        })
        .into_owned();

    code = EXPORT_NAMED
        .replace_all(&code, |caps: &Captures| {
            let mut out = String::new();
            for (orig, local) in split_named_list(&caps[1]) {
                already_assigned.insert(local.clone());
                out.push_str(&format!("module.exports.{local} = {orig}; "));
            }
            out
        })
        .into_owned();

    code = EXPORT_STAR_FROM
        .replace_all(&code, |caps: &Captures| {
            from_counter += 1;
            let tmp = format!("__r{from_counter}");
            let k = format!("__k{from_counter}");
            format!(
                "const {tmp} = require('{}'); for (const {k} in {tmp}) if ({k} !== 'default') module.exports[{k}] = {tmp}[{k}];",
                &caps[2]
            )
        })
        .into_owned();

    declared_names.sort();
    declared_names.dedup();
    for name in &declared_names {
        if !already_assigned.contains(name) {
            code.push_str(&format!("\nmodule.exports.{name} = {name};"));
        }
    }

    let code = mask.restore(&code);

    let mut dependencies = Vec::new();
    let mut seen = HashSet::new();
    for caps in REQUIRE_CALL.captures_iter(&code) {
        let spec = caps[2].to_string();
        if seen.insert(spec.clone()) {
            dependencies.push(spec);
        }
    }

    NormalizeResult { code, dependencies }
}

/// True iff `content` contains ES-module syntax or a `require(` token, after
/// masking strings/comments so text inside them can't trigger a false
/// positive. Used by the transpiler driver's `needsTranspile` decision for
/// plain `.js` files (§4.5 step 3).
pub fn looks_like_module_or_commonjs(content: &str) -> bool {
    let masked = strip_strings_and_comments(content);
    IMPORT_NAMESPACE.is_match(&masked)
        || IMPORT_DEFAULT_AND_NAMED.is_match(&masked)
        || IMPORT_DEFAULT.is_match(&masked)
        || IMPORT_NAMED.is_match(&masked)
        || IMPORT_SIDE_EFFECT.is_match(&masked)
        || EXPORT_DEFAULT.is_match(&masked)
        || EXPORT_DECL.is_match(&masked)
        || EXPORT_FUNCTION.is_match(&masked)
        || EXPORT_CLASS.is_match(&masked)
        || EXPORT_NAMED_FROM.is_match(&masked)
        || EXPORT_NAMED.is_match(&masked)
        || EXPORT_STAR_FROM.is_match(&masked)
        || REQUIRE_CALL.is_match(&masked)
}

lazy_static! {
    static ref LINE_COMMENT: Regex = Regex::new(r"//[^\n]*").unwrap();
    static ref BLOCK_COMMENT: Regex = Regex::new(r"(?s)/\*.*?\*/").unwrap();
    static ref STRING_LITERAL: Regex = Regex::new(r#"'(?:\\.|[^'\\])*'|"(?:\\.|[^"\\])*""#).unwrap();
    static ref TEMPLATE_LITERAL: Regex = Regex::new(r"`(?:\\.|[^`\\])*`").unwrap();
}

fn blank_out(m: &str) -> String {
    m.chars().map(|c| if c == '\n' { '\n' } else { ' ' }).collect()
}

fn strip_strings_and_comments(source: &str) -> String {
    let s = BLOCK_COMMENT.replace_all(source, |c: &Captures| blank_out(&c[0]));
    let s = LINE_COMMENT.replace_all(&s, |c: &Captures| blank_out(&c[0]));
    let s = TEMPLATE_LITERAL.replace_all(&s, |c: &Captures| blank_out(&c[0]));
    STRING_LITERAL.replace_all(&s, |c: &Captures| blank_out(&c[0])).into_owned()
}
