//! WASM wrapper around an analysis session.

use crate::provider::JsSymbolicProvider;
use crate::to_js_error;
use js_sys::Function;
use pitchfork_core::{BifurcationSession, SessionConfig};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmBifurcationSession {
    inner: BifurcationSession,
}

#[wasm_bindgen]
impl WasmBifurcationSession {
    /// Builds the session and computes the diagram. `config` may be
    /// `undefined`, in which case the default ranges are used; missing fields
    /// fall back to their defaults as well.
    #[wasm_bindgen(constructor)]
    pub fn new(
        expression: &str,
        solve_for_x: Function,
        derivative: Function,
        resolve_at: Function,
        config: JsValue,
    ) -> Result<WasmBifurcationSession, JsValue> {
        console_error_panic_hook::set_once();

        let config: SessionConfig = if config.is_undefined() || config.is_null() {
            SessionConfig::default()
        } else {
            from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid session config: {}", e)))?
        };

        let provider = JsSymbolicProvider::new(solve_for_x, derivative, resolve_at);
        let inner = BifurcationSession::new(config, expression, &provider).map_err(to_js_error)?;
        Ok(WasmBifurcationSession { inner })
    }

    pub fn set_r(&mut self, value: f64) -> Result<(), JsValue> {
        self.inner.set_r(value).map_err(to_js_error)
    }

    pub fn set_x0(&mut self, value: f64) -> Result<(), JsValue> {
        self.inner.set_x0(value).map_err(to_js_error)
    }

    pub fn r(&self) -> f64 {
        self.inner.r()
    }

    pub fn x0(&self) -> f64 {
        self.inner.x0()
    }

    pub fn grid_index(&self) -> usize {
        self.inner.grid_index()
    }

    pub fn num_roots(&self) -> usize {
        self.inner.num_roots()
    }

    pub fn r_values(&self) -> Vec<f64> {
        self.inner.grid().values().to_vec()
    }

    pub fn initial_velocity(&self) -> Option<f64> {
        self.inner.initial_velocity()
    }

    /// Current root values; undefined entries for branches without a real root.
    pub fn roots(&self) -> Result<JsValue, JsValue> {
        encode(&self.inner.roots())
    }

    /// Current labels as `"stable" | "unstable" | "undefined"`.
    pub fn stability(&self) -> Result<JsValue, JsValue> {
        encode(&self.inner.stability())
    }

    pub fn equilibria(&self) -> Result<JsValue, JsValue> {
        encode(&self.inner.equilibria())
    }

    pub fn velocity_field(&self) -> Result<JsValue, JsValue> {
        encode(self.inner.velocity_field())
    }

    pub fn trajectory(&self) -> Result<JsValue, JsValue> {
        encode(self.inner.trajectory())
    }

    pub fn diagram(&self) -> Result<JsValue, JsValue> {
        encode(self.inner.diagram())
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        encode(&self.inner.snapshot())
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}
