//! Adapts a JS `console`-shaped object (`log`/`warn`/`error`/`clear`) to
//! [`ConsoleSink`] (§4.7.3).

use js_sys::Function;
use module_loader::{ConsoleLevel, ConsoleSink};
use wasm_bindgen::JsValue;

pub struct JsConsole {
    log_fn: Function,
    warn_fn: Function,
    error_fn: Function,
    clear_fn: Function,
}

impl JsConsole {
    pub fn new(log_fn: Function, warn_fn: Function, error_fn: Function, clear_fn: Function) -> Self {
        Self { log_fn, warn_fn, error_fn, clear_fn }
    }
}

impl ConsoleSink for JsConsole {
    fn write(&self, level: ConsoleLevel, message: &str) {
        let target = match level {
            ConsoleLevel::Log => &self.log_fn,
            ConsoleLevel::Warn => &self.warn_fn,
            ConsoleLevel::Error => &self.error_fn,
        };
        let _ = target.call1(&JsValue::NULL, &JsValue::from_str(message));
    }

    fn clear(&self) {
        let _ = self.clear_fn.call0(&JsValue::NULL);
    }
}
