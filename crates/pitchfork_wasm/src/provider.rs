//! Symbolic provider backed by JavaScript callbacks.

use anyhow::{anyhow, Result};
use js_sys::Function;
use pitchfork_core::SymbolicProvider;
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

/// Forwards the three symbolic capabilities to functions supplied by the UI:
/// `solveForX(expr) -> string[]`, `derivative(expr, variable) -> string` and
/// `resolveAt(expr, r) -> number[]`.
pub struct JsSymbolicProvider {
    solve_for_x: Function,
    derivative: Function,
    resolve_at: Function,
}

impl JsSymbolicProvider {
    pub fn new(solve_for_x: Function, derivative: Function, resolve_at: Function) -> Self {
        Self {
            solve_for_x,
            derivative,
            resolve_at,
        }
    }
}

impl SymbolicProvider for JsSymbolicProvider {
    fn solve_for_x(&self, expression: &str) -> Result<Vec<String>> {
        let value = self
            .solve_for_x
            .call1(&JsValue::NULL, &JsValue::from_str(expression))
            .map_err(|e| js_failure("solveForX", e))?;
        decode("solveForX", value)
    }

    fn derivative(&self, expression: &str, variable: &str) -> Result<String> {
        let value = self
            .derivative
            .call2(
                &JsValue::NULL,
                &JsValue::from_str(expression),
                &JsValue::from_str(variable),
            )
            .map_err(|e| js_failure("derivative", e))?;
        value
            .as_string()
            .ok_or_else(|| anyhow!("derivative did not return a string"))
    }

    fn resolve_at(&self, expression: &str, r: f64) -> Result<Vec<f64>> {
        let value = self
            .resolve_at
            .call2(
                &JsValue::NULL,
                &JsValue::from_str(expression),
                &JsValue::from_f64(r),
            )
            .map_err(|e| js_failure("resolveAt", e))?;
        decode("resolveAt", value)
    }
}

fn decode<T: DeserializeOwned>(callback: &str, value: JsValue) -> Result<T> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| anyhow!("{callback} returned an unexpected value: {e}"))
}

fn js_failure(callback: &str, error: JsValue) -> anyhow::Error {
    thrown(callback, error.as_string(), || format!("{error:?}"))
}

/// Names the callback and what it threw; non-string throws fall back to
/// their debug rendering.
fn thrown(
    callback: &str,
    message: Option<String>,
    fallback: impl FnOnce() -> String,
) -> anyhow::Error {
    let message = message.unwrap_or_else(fallback);
    anyhow!("{callback} threw: {message}")
}
