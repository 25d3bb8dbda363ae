//! Wraps a transpiled body into the evaluable shape from §4.7.4.

/// `(function(module, exports, require, __filename, __dirname, console){
///    <body>
///    return module.exports;
///  })`
pub fn wrap_module_body(code: &str) -> String {
    format!(
        "(function(module, exports, require, __filename, __dirname, console){{\n{code}\nreturn module.exports;\n}})"
    )
}

/// The entry file additionally runs inside an `async` IIFE so that
/// top-level `await` is tolerated (§4.7.4).
pub fn wrap_entry_body(code: &str) -> String {
    let inner = wrap_module_body(code);
    format!("(async () => ({inner})(module, exports, require, __filename, __dirname, console))()")
}
