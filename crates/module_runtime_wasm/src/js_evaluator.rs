//! The wasm-bindgen discharge of [`BodyEvaluator`] (§4.7.3, §9 "sandbox
//! construction"): the host supplies one JS function, `compileAndRun(code,
//! bindings)`, and actually compiles/invokes the wrapped body (e.g. via
//! `new Function(...)`) — nothing here runs JS itself.

use js_sys::{Function, Object, Reflect};
use module_loader::{BodyEvaluator, ConsoleLevel, ConsoleSink, EvalError, ExportsCell, RequireOutcome, SandboxBindings};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Exposes one module's live exports cell to JS: `get()` reads the current
/// value, `set(value)` writes it. Passed into `bindings.moduleExports`
/// instead of a plain value so the host can observe writes made mid-body
/// (cycle-safety, §9: "mutate the same cell the caller holds") and so a
/// `require`d dependency that is still `loading` hands back the same live
/// handle.
#[wasm_bindgen]
pub struct ExportsHandle(ExportsCell);

#[wasm_bindgen]
impl ExportsHandle {
    pub fn get(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&*self.0.read()).map_err(|err| JsValue::from_str(&err.to_string()))
    }

    pub fn set(&self, value: JsValue) -> Result<(), JsValue> {
        let parsed: serde_json::Value =
            serde_wasm_bindgen::from_value(value).map_err(|err| JsValue::from_str(&err.to_string()))?;
        *self.0.write() = parsed;
        Ok(())
    }
}

impl ExportsHandle {
    pub fn wrap(cell: ExportsCell) -> Self {
        Self(cell)
    }
}

pub struct JsBodyEvaluator {
    compile_and_run_fn: Function,
}

impl JsBodyEvaluator {
    pub fn new(compile_and_run_fn: Function) -> Self {
        Self { compile_and_run_fn }
    }
}

fn require_outcome_to_js(outcome: RequireOutcome) -> Result<JsValue, JsValue> {
    let obj = Object::new();
    match outcome {
        RequireOutcome::Builtin(module) => {
            Reflect::set(&obj, &JsValue::from_str("kind"), &JsValue::from_str("builtin"))?;
            let value = serde_wasm_bindgen::to_value(module.value()).map_err(|e| JsValue::from_str(&e.to_string()))?;
            Reflect::set(&obj, &JsValue::from_str("value"), &value)?;
        }
        RequireOutcome::Module(cell) => {
            Reflect::set(&obj, &JsValue::from_str("kind"), &JsValue::from_str("module"))?;
            let handle: JsValue = ExportsHandle::wrap(cell).into();
            Reflect::set(&obj, &JsValue::from_str("exports"), &handle)?;
        }
    }
    Ok(obj.into())
}

impl BodyEvaluator for JsBodyEvaluator {
    fn compile_and_run(&self, code: &str, bindings: SandboxBindings<'_>) -> Result<(), EvalError> {
        // SAFETY: only the borrowed lifetime on the trait object is erased
        // here, not its representation (`Box<dyn Fn + 'a>` and
        // `Box<dyn Fn + 'static>` share layout). We then deliberately leak
        // the wasm closure below because a body wrapped in an async IIFE
        // (§4.7.4) may still call `require` after this function returns to
        // the host, past the point `'a` would otherwise expire. Documented
        // as a one-leak-per-`execute()` tradeoff in DESIGN.md.
        let require: Box<dyn Fn(&str) -> Result<RequireOutcome, anyhow::Error>> =
            unsafe { std::mem::transmute(bindings.require) };
        let require_closure = Closure::wrap(Box::new(move |spec: String| -> Result<JsValue, JsValue> {
            match require(&spec) {
                Ok(outcome) => require_outcome_to_js(outcome),
                Err(err) => Err(JsValue::from_str(&err.to_string())),
            }
        }) as Box<dyn FnMut(String) -> Result<JsValue, JsValue>>);
        let require_fn = require_closure.as_ref().unchecked_ref::<Function>().clone();
        require_closure.forget();

        let exports_handle: JsValue = ExportsHandle::wrap(bindings.module_exports).into();

        // SAFETY: same lifetime-erase-and-leak tradeoff as `require` above;
        // `console.log` calls made from inside an async IIFE after this
        // function returns still need somewhere to write.
        let console: &'static dyn ConsoleSink = unsafe { std::mem::transmute(bindings.console) };
        let console_fn = |level: ConsoleLevel| {
            let closure = Closure::wrap(Box::new(move |message: String| {
                console.write(level, &message);
            }) as Box<dyn FnMut(String)>);
            let f = closure.as_ref().unchecked_ref::<Function>().clone();
            closure.forget();
            f
        };
        let clear_fn = {
            let closure = Closure::wrap(Box::new(move || {
                console.clear();
            }) as Box<dyn FnMut()>);
            let f = closure.as_ref().unchecked_ref::<Function>().clone();
            closure.forget();
            f
        };
        let console_obj = Object::new();
        let set_console = |key: &str, value: &JsValue| Reflect::set(&console_obj, &JsValue::from_str(key), value);
        set_console("log", &console_fn(ConsoleLevel::Log)).map_err(js_to_eval_error)?;
        set_console("warn", &console_fn(ConsoleLevel::Warn)).map_err(js_to_eval_error)?;
        set_console("error", &console_fn(ConsoleLevel::Error)).map_err(js_to_eval_error)?;
        set_console("clear", &clear_fn).map_err(js_to_eval_error)?;

        let js_bindings = Object::new();
        let set = |key: &str, value: &JsValue| Reflect::set(&js_bindings, &JsValue::from_str(key), value);
        set("filename", &JsValue::from_str(&bindings.filename)).map_err(js_to_eval_error)?;
        set("dirname", &JsValue::from_str(&bindings.dirname)).map_err(js_to_eval_error)?;
        set("moduleExports", &exports_handle).map_err(js_to_eval_error)?;
        set("require", &require_fn).map_err(js_to_eval_error)?;
        set("console", &console_obj.into()).map_err(js_to_eval_error)?;
        let argv = serde_wasm_bindgen::to_value(&bindings.argv).map_err(|e| EvalError(e.to_string()))?;
        set("argv", &argv).map_err(js_to_eval_error)?;

        self.compile_and_run_fn
            .call2(&JsValue::NULL, &JsValue::from_str(code), &js_bindings)
            .map(|_| ())
            .map_err(js_to_eval_error)
    }
}

fn js_to_eval_error(value: JsValue) -> EvalError {
    EvalError(value.as_string().unwrap_or_else(|| format!("{value:?}")))
}
