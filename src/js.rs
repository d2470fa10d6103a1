//! Reflect wrappers for duck-typed browser APIs.
//!
//! Several signals (battery, `navigator.connection`, sensor constructors,
//! `permissions.query`) are missing from some engines or missing from
//! web-sys, so they are reached by property name instead of through typed
//! bindings. `undefined` and `null` both read as "absent".

use js_sys::{Array, Function, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::error::{CollectorError, Result};

/// Get a property from the global scope.
pub fn get_global(prop: &str) -> Option<JsValue> {
    get_property(&js_sys::global(), prop)
}

/// `true` if the global scope defines `name` (constructor detection).
pub fn global_has(name: &str) -> bool {
    get_global(name).is_some()
}

pub fn navigator() -> Result<JsValue> {
    get_global("navigator").ok_or_else(|| CollectorError::Unavailable("navigator".into()))
}

/// Read `obj[prop]`, treating `undefined`, `null` and throwing getters as absent.
pub fn get_property(obj: &JsValue, prop: &str) -> Option<JsValue> {
    Reflect::get(obj, &JsValue::from_str(prop))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

/// First of `props` that is present on `obj`
pub fn first_property(obj: &JsValue, props: &[&str]) -> Option<JsValue> {
    props.iter().find_map(|p| get_property(obj, p))
}

pub fn has_method(obj: &JsValue, name: &str) -> bool {
    get_property(obj, name).map_or(false, |m| m.is_function())
}

/// Call `obj[name](...args)`.
pub fn call_method(obj: &JsValue, name: &str, args: &Array) -> Result<JsValue> {
    let method: Function = get_property(obj, name)
        .and_then(|m| m.dyn_into().ok())
        .ok_or_else(|| CollectorError::Unavailable(name.to_string()))?;
    Reflect::apply(&method, obj, args).map_err(|e| CollectorError::from_js(name, &e))
}

/// Await a value that should be a promise.
pub async fn await_promise(value: JsValue, context: &str) -> Result<JsValue> {
    let promise: Promise = value
        .dyn_into()
        .map_err(|_| CollectorError::Js(format!("{} did not return a promise", context)))?;
    JsFuture::from(promise)
        .await
        .map_err(|e| CollectorError::from_js(context, &e))
}

pub fn get_f64(obj: &JsValue, prop: &str) -> Option<f64> {
    get_property(obj, prop).and_then(|v| v.as_f64())
}

pub fn get_bool(obj: &JsValue, prop: &str) -> Option<bool> {
    get_property(obj, prop).and_then(|v| v.as_bool())
}

/// String property, with empty strings treated as absent
pub fn get_string(obj: &JsValue, prop: &str) -> Option<String> {
    get_property(obj, prop)
        .and_then(|v| v.as_string())
        .filter(|s| !s.is_empty())
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use js_sys::Object;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_missing_and_null_are_absent() {
        let obj = Object::new();
        Reflect::set(&obj, &"nothing".into(), &JsValue::NULL).unwrap();
        Reflect::set(&obj, &"level".into(), &JsValue::from_f64(0.5)).unwrap();

        assert!(get_property(&obj, "nothing").is_none());
        assert!(get_property(&obj, "missing").is_none());
        assert_eq!(get_f64(&obj, "level"), Some(0.5));
        assert_eq!(first_property(&obj, &["missing", "level"]).and_then(|v| v.as_f64()), Some(0.5));
    }

    #[wasm_bindgen_test]
    fn test_navigator_present_in_browser() {
        assert!(navigator().is_ok());
        assert!(global_has("Promise"));
        assert!(!global_has("DefinitelyNotAGlobal"));
    }
}
