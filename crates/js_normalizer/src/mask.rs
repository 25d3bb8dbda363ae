//! Masks `import.meta` and dynamic `import(...)` before the rewrite rules
//! run, restoring them verbatim once rewriting is done. Per spec, neither
//! form is ever rewritten; masking keeps the line-oriented rewrite regexes
//! below from tripping over the bare `import` keyword inside either form.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IMPORT_META: Regex = Regex::new(r"import\s*\.\s*meta").unwrap();
    // one level of nested parens is enough for any realistic dynamic import call
    static ref DYNAMIC_IMPORT: Regex =
        Regex::new(r"import\s*\((?:[^()]|\([^()]*\))*\)").unwrap();
    static ref PLACEHOLDER: Regex = Regex::new("\u{E000}(\\d+)\u{E001}").unwrap();
}

/// Holds the masked-out fragments so [`Mask::restore`] can put them back.
#[derive(Default)]
pub struct Mask {
    saved: Vec<String>,
}

impl Mask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mask(&mut self, source: &str) -> String {
        let masked = IMPORT_META.replace_all(source, |caps: &regex::Captures| self.stash(&caps[0]));
        DYNAMIC_IMPORT
            .replace_all(&masked, |caps: &regex::Captures| self.stash(&caps[0]))
            .into_owned()
    }

    fn stash(&mut self, text: &str) -> String {
        let idx = self.saved.len();
        self.saved.push(text.to_string());
        format!("\u{E000}{idx}\u{E001}")
    }

    pub fn restore(&self, code: &str) -> String {
        PLACEHOLDER
            .replace_all(code, |caps: &regex::Captures| {
                let idx: usize = caps[1].parse().expect("placeholder index is always numeric");
                self.saved[idx].clone()
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn masks_and_restores_import_meta() {
        let mut mask = Mask::new();
        let masked = mask.mask("console.log(import.meta.url);");
        assert!(!masked.contains("import"));
        assert_eq!(mask.restore(&masked), "console.log(import.meta.url);");
    }

    #[test]
    fn masks_and_restores_dynamic_import() {
        let mut mask = Mask::new();
        let masked = mask.mask("const m = import('./lazy.js');");
        assert!(!masked.contains("import("));
        assert_eq!(mask.restore(&masked), "const m = import('./lazy.js');");
    }

    #[test]
    fn leaves_static_import_untouched() {
        let mut mask = Mask::new();
        let masked = mask.mask("import { a } from './a.js';");
        assert_eq!(masked, "import { a } from './a.js';");
    }
}
